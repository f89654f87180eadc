//! Droptrack 공통 크레이트
//!
//! 게임 클라이언트 로그에서 아이템 드롭을 추적하는 데 필요한
//! 도메인 타입, 이벤트, 에러, 설정, 저장소 포트를 정의합니다.
//! `droptrack-log-pipeline`과 `droptrack-daemon`이 이 크레이트에 의존합니다.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod repository;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DroptrackError, ParseError, PipelineError, StorageError};

// 설정
pub use config::DroptrackConfig;

// 이벤트
pub use event::{DropEvent, Event, EventMetadata, ItemDropEvent, MapEvent, MapPhase};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 저장소 포트
pub use repository::{DropRepository, ItemLookup};

// 도메인 타입
pub use types::{GameMap, Item, ItemId, LogEntry, MapId};
