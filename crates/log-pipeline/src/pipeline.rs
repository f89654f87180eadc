//! 파이프라인 오케스트레이션 -- tail/디스패치/집계/알림의 전체 흐름을 관리합니다.
//!
//! [`DropTracker`]는 core의 [`Pipeline`](droptrack_core::pipeline::Pipeline) trait을 구현하여
//! `droptrack-daemon`에서 같은 생명주기(start/stop/health_check)로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! Tailer -> LineDispatcher -> DropAggregator -> DropProjector -> ChangeNotifier -> subscribers
//!              |                    |
//!       PatternRegistry      DropRepository
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use droptrack_core::config::DroptrackConfig;
use droptrack_core::error::{DroptrackError, PipelineError};
use droptrack_core::event::{DropEvent, MapEvent};
use droptrack_core::pipeline::{HealthStatus, Pipeline};
use droptrack_core::repository::{DropRepository, ItemLookup};
use droptrack_core::types::LogEntry;
use regex::Captures;

use crate::aggregator::DropAggregator;
use crate::catalog::ItemCatalog;
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::notifier::{ChangeNotifier, SubscriberError, Subscription};
use crate::processor::{DispatchReport, LineDispatcher, LineObserver, PatternRegistry, Processor};
use crate::projection::DropProjector;
use crate::stats::DropStats;
use crate::store::InMemoryRepository;
use crate::tailer::{LineSink, Tailer, TailerStatus};

/// 원시 라인 피드 프로세서 이름
pub const LINE_FEED_PROCESSOR: &str = "line_feed";

/// 원시 라인 피드는 도메인 처리가 끝난 뒤에 실행됩니다.
const LINE_FEED_ORDER: i32 = i32::MAX;

/// 트래커 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 모든 라인을 라인 알림기로 내보내는 관찰자
struct LineFeed {
    lines: ChangeNotifier<LogEntry>,
}

impl LineObserver for LineFeed {
    fn on_line(
        &self,
        entry: &LogEntry,
        _captures: Option<&Captures<'_>>,
    ) -> Result<(), LogPipelineError> {
        self.lines.broadcast(entry.clone());
        Ok(())
    }
}

/// 드롭 트래커 -- tail 세션과 집계 상태를 소유합니다.
///
/// # 사용 예시
/// ```ignore
/// use droptrack_log_pipeline::DropTrackerBuilder;
///
/// let mut tracker = DropTrackerBuilder::new()
///     .config(config)
///     .lookup(Arc::new(catalog))
///     .build()?;
///
/// let _sub = tracker.notifier().subscribe(|event| {
///     println!("{event}");
///     Ok(())
/// });
/// tracker.start_tailing("/games/UE_game.log", true)?;
/// ```
pub struct DropTracker {
    config: PipelineConfig,
    state: TrackerState,
    tailer: Tailer,
    dispatcher: Arc<LineDispatcher>,
    repository: Arc<dyn DropRepository>,
    lookup: Arc<dyn ItemLookup>,
    drops: ChangeNotifier<DropEvent>,
    maps: ChangeNotifier<MapEvent>,
    lines: ChangeNotifier<LogEntry>,
}

impl DropTracker {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            TrackerState::Initialized => "initialized",
            TrackerState::Running => "running",
            TrackerState::Stopped => "stopped",
        }
    }

    /// 파일 tail을 시작합니다.
    pub fn start_tailing(
        &mut self,
        path: impl Into<PathBuf>,
        from_end: bool,
    ) -> Result<(), LogPipelineError> {
        self.tailer.start(path, from_end)?;
        self.state = TrackerState::Running;
        Ok(())
    }

    /// 파일 tail을 정지합니다. 여러 번 호출해도 안전합니다.
    pub async fn stop_tailing(&mut self) {
        self.tailer.stop().await;
        if self.state == TrackerState::Running {
            self.state = TrackerState::Stopped;
        }
    }

    /// tail 워커가 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.tailer.is_running()
    }

    /// 마지막으로 처리한 라인 번호
    pub fn current_line_number(&self) -> u64 {
        self.tailer.current_line_number()
    }

    /// tailer 상태
    pub fn status(&self) -> TailerStatus {
        self.tailer.status()
    }

    /// tailer가 마지막으로 기록한 에러
    pub fn last_error(&self) -> Option<String> {
        self.tailer.last_error()
    }

    /// 라인 하나를 직접 디스패치합니다.
    ///
    /// tail 없이 라인을 주입할 때 사용합니다. tail 세션과 같은 순서 보장을
    /// 받으려면 tail 중에는 호출하지 않아야 합니다.
    pub fn process_line(&self, entry: &LogEntry) -> DispatchReport {
        self.dispatcher.dispatch(entry)
    }

    /// 드롭 이벤트 알림기
    pub fn notifier(&self) -> &ChangeNotifier<DropEvent> {
        &self.drops
    }

    /// 맵 이벤트 알림기
    pub fn map_notifier(&self) -> &ChangeNotifier<MapEvent> {
        &self.maps
    }

    /// 원시 라인 알림기
    pub fn line_notifier(&self) -> &ChangeNotifier<LogEntry> {
        &self.lines
    }

    /// 모든 라인을 구독합니다.
    pub fn subscribe_lines<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LogEntry) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.lines.subscribe(callback)
    }

    /// 통계 조회기를 반환합니다.
    pub fn stats(&self) -> DropStats {
        DropStats::new(Arc::clone(&self.repository), Arc::clone(&self.lookup))
    }

    /// 저장소 참조
    pub fn repository(&self) -> &Arc<dyn DropRepository> {
        &self.repository
    }

    /// 등록된 프로세서 이름 (우선순위 순서)
    pub fn processor_names(&self) -> Vec<&str> {
        self.dispatcher.registry().processor_names()
    }
}

impl Pipeline for DropTracker {
    async fn start(&mut self) -> Result<(), DroptrackError> {
        if self.tailer.is_running() {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let path = self.config.log_path.clone().ok_or_else(|| {
            PipelineError::InitFailed("no log path configured (tailer.log_path)".to_owned())
        })?;
        let from_end = self.config.from_end;

        tracing::info!(path = %path.display(), "starting drop tracker");
        self.start_tailing(path, from_end)?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DroptrackError> {
        tracing::info!("stopping drop tracker");
        self.stop_tailing().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            TrackerState::Running => match self.tailer.status() {
                TailerStatus::Running => match self.tailer.last_error() {
                    Some(reason) => HealthStatus::Degraded(reason),
                    None => HealthStatus::Healthy,
                },
                other => HealthStatus::Unhealthy(other.to_string()),
            },
            TrackerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            TrackerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 드롭 트래커 빌더
///
/// 저장소와 메타데이터 조회기를 지정하지 않으면 인메모리 저장소와
/// 빈 카탈로그를 사용합니다.
pub struct DropTrackerBuilder {
    config: PipelineConfig,
    repository: Option<Arc<dyn DropRepository>>,
    lookup: Option<Arc<dyn ItemLookup>>,
    observers: Vec<Processor>,
}

impl DropTrackerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            repository: None,
            lookup: None,
            observers: Vec::new(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// core 설정에서 파이프라인 설정을 가져옵니다.
    pub fn core_config(mut self, config: &DroptrackConfig) -> Self {
        self.config = PipelineConfig::from_core(config);
        self
    }

    /// 저장소를 지정합니다.
    pub fn repository(mut self, repository: Arc<dyn DropRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// 아이템 메타데이터 조회기를 지정합니다.
    pub fn lookup(mut self, lookup: Arc<dyn ItemLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// 추가 관찰자 프로세서를 등록합니다.
    pub fn observer(mut self, processor: Processor) -> Self {
        self.observers.push(processor);
        self
    }

    /// 트래커를 빌드합니다.
    ///
    /// 설정 검증이나 패턴 컴파일에 실패하면 에러를 반환합니다.
    pub fn build(self) -> Result<DropTracker, LogPipelineError> {
        self.config.validate()?;

        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryRepository::new()));
        let lookup = self
            .lookup
            .unwrap_or_else(|| Arc::new(ItemCatalog::empty()));

        let drops = ChangeNotifier::new(self.config.backlog_size);
        let maps = ChangeNotifier::new(self.config.backlog_size);
        let lines = ChangeNotifier::new(self.config.backlog_size);

        let projector = DropProjector::new(Arc::clone(&lookup), drops.clone(), maps.clone());
        let aggregator = Arc::new(DropAggregator::new(
            Arc::clone(&repository),
            Arc::new(projector),
        ));

        let mut processors = Processor::from_patterns(&self.config.patterns);
        processors.push(Processor::observer(
            LINE_FEED_PROCESSOR,
            None,
            LINE_FEED_ORDER,
            Arc::new(LineFeed {
                lines: lines.clone(),
            }),
        ));
        processors.extend(self.observers);

        let registry = PatternRegistry::new(processors)?;
        tracing::info!(
            processors = ?registry.processor_names(),
            backlog = self.config.backlog_size,
            "drop tracker built"
        );

        let dispatcher = Arc::new(LineDispatcher::new(registry, aggregator));
        let sink: Arc<dyn LineSink> = dispatcher.clone();
        let tailer = Tailer::from_config(&self.config, sink);

        Ok(DropTracker {
            config: self.config,
            state: TrackerState::Initialized,
            tailer,
            dispatcher,
            repository,
            lookup,
            drops,
            maps,
            lines,
        })
    }
}

impl Default for DropTrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;
    use droptrack_core::config::PatternConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builder_creates_tracker() {
        let tracker = DropTrackerBuilder::new().build().unwrap();
        assert_eq!(tracker.state_name(), "initialized");
        assert!(!tracker.is_running());
        assert_eq!(tracker.status(), TailerStatus::Idle);
        assert_eq!(
            tracker.processor_names(),
            vec!["map_entry", "map_exit", "bag_modify", LINE_FEED_PROCESSOR]
        );
    }

    #[test]
    fn builder_with_invalid_config_fails() {
        let config = PipelineConfig {
            backlog_size: 0,
            ..Default::default()
        };
        assert!(DropTrackerBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn builder_with_invalid_pattern_fails() {
        let patterns = PatternConfig {
            bag_modify: "(unclosed".to_owned(),
            ..Default::default()
        };
        let config = PipelineConfigBuilder::new().patterns(patterns).build().unwrap();
        let err = DropTrackerBuilder::new().config(config).build().err();
        assert!(matches!(err, Some(LogPipelineError::PatternCompile { .. })));
    }

    #[test]
    fn lines_are_fed_to_line_subscribers() {
        let tracker = DropTrackerBuilder::new().build().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _sub = tracker.subscribe_lines(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = tracker.process_line(&LogEntry::new("unrelated", 1));
        assert_eq!(report.matched, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.line_notifier().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn start_without_log_path_fails() {
        let mut tracker = DropTrackerBuilder::new().build().unwrap();
        assert!(tracker.health_check().await.is_unhealthy());

        let err = tracker.start().await.unwrap_err();
        assert!(matches!(
            err,
            DroptrackError::Pipeline(PipelineError::InitFailed(_))
        ));
        assert_eq!(tracker.state_name(), "initialized");
    }

    #[tokio::test]
    async fn pipeline_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "").unwrap();

        let config = PipelineConfigBuilder::new()
            .log_path(&path)
            .poll_interval_ms(10)
            .build()
            .unwrap();
        let mut tracker = DropTrackerBuilder::new().config(config).build().unwrap();

        tracker.start().await.unwrap();
        assert_eq!(tracker.state_name(), "running");
        assert!(tracker.health_check().await.is_healthy());

        let err = tracker.start().await.unwrap_err();
        assert!(matches!(
            err,
            DroptrackError::Pipeline(PipelineError::AlreadyRunning)
        ));

        tracker.stop().await.unwrap();
        tracker.stop().await.unwrap();
        assert_eq!(tracker.state_name(), "stopped");
        assert!(tracker.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn missing_file_reports_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = DropTrackerBuilder::new()
            .config(
                PipelineConfigBuilder::new()
                    .poll_interval_ms(10)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        tracker
            .start_tailing(dir.path().join("absent.log"), true)
            .unwrap();
        for _ in 0..500 {
            if tracker.last_error().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(matches!(
            tracker.health_check().await,
            HealthStatus::Degraded(_)
        ));
        tracker.stop_tailing().await;
    }
}
