//! 라인 디스패처 -- 라인마다 프로세서를 우선순위 순서로 평가합니다.
//!
//! 한 라인이 여러 프로세서와 매칭되면 모두 실행됩니다. 프로세서 하나의
//! 에러나 panic은 기록만 하고 나머지 프로세서와 다음 라인에는 영향을 주지 않습니다.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use droptrack_core::metrics as m;
use droptrack_core::types::LogEntry;
use regex::Captures;
use tracing::{debug, warn};

use super::registry::PatternRegistry;
use super::{Processor, ProcessorKind};
use crate::aggregator::DropAggregator;
use crate::error::LogPipelineError;
use crate::notifier::panic_message;
use crate::tailer::LineSink;

/// 한 라인의 디스패치 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 실행된 프로세서 수
    pub matched: usize,
    /// 실패한 프로세서 수
    pub failed: usize,
}

impl DispatchReport {
    /// 모든 실행이 성공했는지 확인합니다.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// 라인 디스패처
pub struct LineDispatcher {
    registry: PatternRegistry,
    aggregator: Arc<DropAggregator>,
}

impl LineDispatcher {
    /// 새 디스패처를 생성합니다.
    pub fn new(registry: PatternRegistry, aggregator: Arc<DropAggregator>) -> Self {
        Self {
            registry,
            aggregator,
        }
    }

    /// 레지스트리 참조를 반환합니다.
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// 라인 하나를 디스패치합니다.
    pub fn dispatch(&self, entry: &LogEntry) -> DispatchReport {
        let mut report = DispatchReport::default();

        for registered in self.registry.entries() {
            let captures = match &registered.regex {
                Some(regex) => match regex.captures(&entry.raw_line) {
                    Some(caps) => Some(caps),
                    None => continue,
                },
                None => None,
            };

            let processor = &registered.processor;
            report.matched += 1;
            metrics::counter!(m::LINES_MATCHED_TOTAL, m::LABEL_PROCESSOR => processor.name().to_owned())
                .increment(1);
            debug!(line = entry.line_number, processor = processor.name(), "line matched");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.invoke(processor, entry, captures.as_ref())
            }));
            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            report.failed += 1;
            warn!(
                line = entry.line_number,
                processor = processor.name(),
                reason = %reason,
                "processor failed, continuing"
            );
            metrics::counter!(m::HANDLER_FAILURES_TOTAL, m::LABEL_PROCESSOR => processor.name().to_owned())
                .increment(1);
        }

        report
    }

    fn invoke(
        &self,
        processor: &Processor,
        entry: &LogEntry,
        captures: Option<&Captures<'_>>,
    ) -> Result<(), LogPipelineError> {
        match &processor.kind {
            ProcessorKind::BagInit => {
                self.aggregator
                    .on_bag_init(entry, require_captures(processor, captures)?)?;
            }
            ProcessorKind::BagModify => {
                self.aggregator
                    .on_bag_modify(entry, require_captures(processor, captures)?)?;
            }
            ProcessorKind::MapEntry => {
                self.aggregator.on_map_entry(entry)?;
            }
            ProcessorKind::MapExit => {
                self.aggregator.on_map_exit(entry)?;
            }
            ProcessorKind::Observer { observer, .. } => {
                observer.on_line(entry, captures)?;
            }
        }
        Ok(())
    }
}

impl LineSink for LineDispatcher {
    fn deliver(&self, entry: LogEntry) {
        self.dispatch(&entry);
    }
}

fn require_captures<'a, 'h>(
    processor: &Processor,
    captures: Option<&'a Captures<'h>>,
) -> Result<&'a Captures<'h>, LogPipelineError> {
    captures.ok_or_else(|| LogPipelineError::Capture {
        processor: processor.name().to_owned(),
        field: "*".to_owned(),
        reason: "processor requires a pattern".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::EventSink;
    use crate::processor::LineObserver;
    use crate::store::InMemoryRepository;
    use droptrack_core::event::ItemDropEvent;
    use droptrack_core::repository::DropRepository;
    use parking_lot::Mutex;

    struct NullSink;

    impl EventSink for NullSink {
        fn item_dropped(&self, _event: ItemDropEvent) {}
    }

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<(u64, Option<String>)>>,
    }

    impl LineObserver for Recorder {
        fn on_line(
            &self,
            entry: &LogEntry,
            captures: Option<&Captures<'_>>,
        ) -> Result<(), LogPipelineError> {
            let word = captures.and_then(|c| c.get(1)).map(|m| m.as_str().to_owned());
            self.lines.lock().push((entry.line_number, word));
            Ok(())
        }
    }

    struct Failing;

    impl LineObserver for Failing {
        fn on_line(
            &self,
            _entry: &LogEntry,
            _captures: Option<&Captures<'_>>,
        ) -> Result<(), LogPipelineError> {
            Err(LogPipelineError::Capture {
                processor: "failing".to_owned(),
                field: "x".to_owned(),
                reason: "always".to_owned(),
            })
        }
    }

    struct Panicking;

    impl LineObserver for Panicking {
        fn on_line(
            &self,
            _entry: &LogEntry,
            _captures: Option<&Captures<'_>>,
        ) -> Result<(), LogPipelineError> {
            panic!("observer exploded");
        }
    }

    fn dispatcher(processors: Vec<Processor>) -> (LineDispatcher, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        let aggregator = Arc::new(DropAggregator::new(repo.clone(), Arc::new(NullSink)));
        let registry = PatternRegistry::new(processors).unwrap();
        (LineDispatcher::new(registry, aggregator), repo)
    }

    #[test]
    fn unmatched_line_runs_nothing() {
        let recorder = Arc::new(Recorder::default());
        let (dispatcher, _) = dispatcher(vec![Processor::observer(
            "rec",
            Some(r"hello (\w+)".to_owned()),
            1,
            recorder.clone(),
        )]);

        let report = dispatcher.dispatch(&LogEntry::new("nothing here", 1));
        assert_eq!(report, DispatchReport::default());
        assert!(recorder.lines.lock().is_empty());
    }

    #[test]
    fn patternless_processor_sees_every_line_without_captures() {
        let recorder = Arc::new(Recorder::default());
        let (dispatcher, _) =
            dispatcher(vec![Processor::observer("all", None, 0, recorder.clone())]);

        dispatcher.dispatch(&LogEntry::new("a", 1));
        dispatcher.dispatch(&LogEntry::new("b", 2));
        assert_eq!(*recorder.lines.lock(), vec![(1, None), (2, None)]);
    }

    #[test]
    fn all_matching_processors_run() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let (dispatcher, _) = dispatcher(vec![
            Processor::observer("second", Some(r"(world)".to_owned()), 2, second.clone()),
            Processor::observer("first", Some(r"hello (\w+)".to_owned()), 1, first.clone()),
        ]);

        let report = dispatcher.dispatch(&LogEntry::new("hello world", 7));
        assert_eq!(report.matched, 2);
        assert!(report.is_clean());
        assert_eq!(*first.lines.lock(), vec![(7, Some("world".to_owned()))]);
        assert_eq!(*second.lines.lock(), vec![(7, Some("world".to_owned()))]);
    }

    #[test]
    fn failures_and_panics_are_isolated() {
        let recorder = Arc::new(Recorder::default());
        let (dispatcher, _) = dispatcher(vec![
            Processor::observer("failing", None, 1, Arc::new(Failing)),
            Processor::observer("panicking", None, 2, Arc::new(Panicking)),
            Processor::observer("rec", None, 3, recorder.clone()),
        ]);

        let report = dispatcher.dispatch(&LogEntry::new("x", 1));
        assert_eq!(report.matched, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(recorder.lines.lock().len(), 1);

        let report = dispatcher.dispatch(&LogEntry::new("y", 2));
        assert_eq!(report.failed, 2);
        assert_eq!(recorder.lines.lock().len(), 2);
    }

    #[test]
    fn modify_without_pattern_is_reported_as_failure() {
        let (dispatcher, repo) =
            dispatcher(vec![Processor::new(ProcessorKind::BagModify, None, 1)]);
        let report = dispatcher.dispatch(&LogEntry::new("anything", 1));
        assert_eq!(report.failed, 1);
        assert_eq!(repo.count_items().unwrap(), 0);
    }

    #[test]
    fn map_processors_drive_aggregator() {
        let (dispatcher, repo) = dispatcher(vec![
            Processor::new(ProcessorKind::MapEntry, Some("ENTER".to_owned()), 15),
            Processor::new(ProcessorKind::MapExit, Some("LEAVE".to_owned()), 15),
        ]);

        dispatcher.dispatch(&LogEntry::new("ENTER", 1));
        assert!(repo.find_active_map().unwrap().is_some());
        dispatcher.deliver(LogEntry::new("LEAVE", 2));
        assert!(repo.find_active_map().unwrap().is_none());
        assert_eq!(repo.count_maps().unwrap(), 1);
    }
}
