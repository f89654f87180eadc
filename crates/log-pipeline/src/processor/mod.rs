//! 프로세서 -- 패턴과 우선순위가 붙은 라인 처리 단위
//!
//! # 구성
//! - [`Processor`]: 종류, 선택적 정규식 패턴, 우선순위
//! - [`PatternRegistry`]: 우선순위 정렬 및 패턴 사전 컴파일
//! - [`LineDispatcher`]: 라인마다 프로세서를 순서대로 평가하고 실패를 격리
//!
//! 우선순위 값이 작을수록 먼저 평가됩니다. 패턴이 없는 프로세서는
//! 모든 라인에서 캡처 없이 호출됩니다.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{DispatchReport, LineDispatcher};
pub use registry::PatternRegistry;

use std::fmt;
use std::sync::Arc;

use droptrack_core::config::PatternConfig;
use droptrack_core::types::LogEntry;
use regex::Captures;

use crate::error::LogPipelineError;

/// 원시 라인 관찰자
///
/// 도메인 상태를 바꾸지 않고 라인(과 패턴이 있으면 캡처)을 받아보는 확장 지점입니다.
pub trait LineObserver: Send + Sync {
    /// 매칭된 라인을 처리합니다.
    fn on_line(
        &self,
        entry: &LogEntry,
        captures: Option<&Captures<'_>>,
    ) -> Result<(), LogPipelineError>;
}

/// 프로세서 종류
#[derive(Clone)]
pub enum ProcessorKind {
    /// 초기 인벤토리 스냅샷
    BagInit,
    /// 슬롯 수량 변경
    BagModify,
    /// 맵 진입
    MapEntry,
    /// 맵 퇴장
    MapExit,
    /// 원시 라인 관찰자
    Observer {
        /// 로그/메트릭에 쓰이는 이름
        name: String,
        /// 관찰자 구현
        observer: Arc<dyn LineObserver>,
    },
}

impl ProcessorKind {
    /// 프로세서 이름
    pub fn name(&self) -> &str {
        match self {
            Self::BagInit => "bag_init",
            Self::BagModify => "bag_modify",
            Self::MapEntry => "map_entry",
            Self::MapExit => "map_exit",
            Self::Observer { name, .. } => name,
        }
    }
}

impl fmt::Debug for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observer { name, .. } => f.debug_struct("Observer").field("name", name).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// 라인 처리 단위
#[derive(Debug, Clone)]
pub struct Processor {
    /// 종류
    pub kind: ProcessorKind,
    /// 정규식 패턴 (`None`이면 모든 라인)
    pub pattern: Option<String>,
    /// 우선순위 (작을수록 먼저)
    pub order: i32,
}

impl Processor {
    /// 새 프로세서를 생성합니다.
    pub fn new(kind: ProcessorKind, pattern: Option<String>, order: i32) -> Self {
        Self {
            kind,
            pattern,
            order,
        }
    }

    /// 관찰자 프로세서를 생성합니다.
    pub fn observer(
        name: impl Into<String>,
        pattern: Option<String>,
        order: i32,
        observer: Arc<dyn LineObserver>,
    ) -> Self {
        Self::new(
            ProcessorKind::Observer {
                name: name.into(),
                observer,
            },
            pattern,
            order,
        )
    }

    /// 프로세서 이름
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// 패턴 설정에서 집계용 프로세서 목록을 만듭니다.
    ///
    /// 슬롯 초기화 프로세서는 `bag_init_enabled`일 때만 포함됩니다.
    pub fn from_patterns(patterns: &PatternConfig) -> Vec<Self> {
        let mut processors = Vec::with_capacity(4);
        if patterns.bag_init_enabled {
            processors.push(Self::new(
                ProcessorKind::BagInit,
                Some(patterns.bag_init.clone()),
                patterns.bag_init_order,
            ));
        }
        processors.push(Self::new(
            ProcessorKind::MapEntry,
            Some(patterns.map_entry.clone()),
            patterns.map_entry_order,
        ));
        processors.push(Self::new(
            ProcessorKind::MapExit,
            Some(patterns.map_exit.clone()),
            patterns.map_exit_order,
        ));
        processors.push(Self::new(
            ProcessorKind::BagModify,
            Some(patterns.bag_modify.clone()),
            patterns.bag_modify_order,
        ));
        processors
    }
}
