//! # droptrack-log-pipeline
//!
//! 게임 클라이언트 로그를 tail하여 아이템 드롭과 맵 세션을 집계합니다.
//!
//! # 모듈 구성
//!
//! - [`tailer`]: 로그 파일 폴링, 로테이션 감지, 라인 번호 부여
//! - [`processor`]: 패턴 레지스트리와 라인 디스패처
//! - [`aggregator`]: 아이템 수량/누적량과 맵 수명 주기 갱신
//! - [`notifier`]: 구독자 fan-out 및 최근 이벤트 백로그
//! - [`projection`]: 집계 이벤트를 구독자용 드롭 이벤트로 변환
//! - [`store`]: 인메모리 저장소
//! - [`catalog`]: `full_table.json` 아이템 메타데이터
//! - [`stats`]: 수익/맵 통계
//! - [`pipeline`]: 전체 흐름 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Tailer -> LineDispatcher -> DropAggregator -> ChangeNotifier -> subscribers
//!   |            |                  |
//! rotation  PatternRegistry   DropRepository
//! ```

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notifier;
pub mod pipeline;
pub mod processor;
pub mod projection;
pub mod stats;
pub mod store;
pub mod tailer;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{DropTracker, DropTrackerBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 프로세서
pub use processor::{
    DispatchReport, LineDispatcher, LineObserver, PatternRegistry, Processor, ProcessorKind,
};

// 집계
pub use aggregator::{DropAggregator, EventSink, MapEntryOutcome};

// 알림
pub use notifier::{ChangeNotifier, SubscriberError, Subscription};

// tail
pub use tailer::{LineSink, Tailer, TailerStatus};

// 협력자
pub use catalog::{ItemCatalog, ItemMeta};
pub use projection::{DropProjector, project};
pub use stats::DropStats;
pub use store::InMemoryRepository;
