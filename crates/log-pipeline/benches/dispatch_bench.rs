//! 라인 디스패치 벤치마크
//!
//! 매칭되지 않는 라인, 수량 변경 라인, 관찰자 수 증가에 따른 처리량을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use droptrack_core::config::{HIDEOUT_SCENE, PatternConfig};
use droptrack_core::types::LogEntry;
use droptrack_log_pipeline::{DropTrackerBuilder, LineObserver, LogPipelineError, Processor};
use regex::Captures;

struct Nop;

impl LineObserver for Nop {
    fn on_line(
        &self,
        _entry: &LogEntry,
        _captures: Option<&Captures<'_>>,
    ) -> Result<(), LogPipelineError> {
        Ok(())
    }
}

fn modify_line(slot: u32, num: i64) -> String {
    format!(
        "[2025.11.04-19.23.40:548][  5]GameLog: Display: [Game] BagMgr@:Modfy BagItem PageId = 102 SlotId = {slot} ConfigBaseId = 5028 Num = {num}"
    )
}

fn bench_unmatched_line(c: &mut Criterion) {
    let tracker = DropTrackerBuilder::new().build().unwrap();
    let entry = LogEntry::new(
        "[2025.11.04-19.23.40:548][  5]LogStreaming: Display: Flushing async loaders.",
        1,
    );

    let mut group = c.benchmark_group("dispatch_unmatched");
    group.throughput(Throughput::Elements(1));
    group.bench_function("default_processors", |b| {
        b.iter(|| tracker.process_line(black_box(&entry)))
    });
    group.finish();
}

fn bench_modify_line(c: &mut Criterion) {
    let tracker = DropTrackerBuilder::new().build().unwrap();
    tracker.process_line(&LogEntry::new(
        format!(
            "PageApplyBase@ _UpdateGameEnd: LastSceneName = World'{HIDEOUT_SCENE}' NextSceneName = World'/Game/Art/Maps/02SD/A/A.A'"
        ),
        1,
    ));
    let entries: Vec<LogEntry> = (0..64)
        .map(|i| LogEntry::new(modify_line(i % 8, i64::from(i)), u64::from(i) + 2))
        .collect();

    let mut group = c.benchmark_group("dispatch_modify");
    group.throughput(Throughput::Elements(entries.len() as u64));
    group.bench_function("active_map", |b| {
        b.iter(|| {
            for entry in &entries {
                tracker.process_line(black_box(entry));
            }
        })
    });
    group.finish();
}

fn bench_observer_scaling(c: &mut Criterion) {
    let entry = LogEntry::new(modify_line(1, 5), 1);
    let mut group = c.benchmark_group("observer_scaling");

    for count in [0usize, 4, 16] {
        let mut builder = DropTrackerBuilder::new();
        for i in 0..count {
            builder = builder.observer(Processor::observer(
                format!("observer-{i}"),
                Some(r"ConfigBaseId = (\d+)".to_owned()),
                30,
                Arc::new(Nop),
            ));
        }
        let tracker = builder.build().unwrap();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| tracker.process_line(black_box(&entry)))
        });
    }

    group.finish();
}

fn bench_registry_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_build");
    group.bench_function("default_patterns", |b| {
        b.iter(|| {
            let processors = Processor::from_patterns(black_box(&PatternConfig::default()));
            droptrack_log_pipeline::PatternRegistry::new(processors).unwrap()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_unmatched_line,
    bench_modify_line,
    bench_observer_scaling,
    bench_registry_build
);
criterion_main!(benches);
