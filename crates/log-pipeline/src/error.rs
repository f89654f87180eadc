//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for DroptrackError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! # 분류
//! - 설정 에러 (`PatternCompile`, `Config`, `Catalog`): 시작 전에 실패, 치명적
//! - 라인 단위 에러 (`Capture`, `Storage`): 해당 프로세서 호출만 건너뜀
//! - 일시적 I/O 에러 (`Tail`): tailer가 다음 폴링에서 재시도

use droptrack_core::error::{
    ConfigError, DroptrackError, ParseError, PipelineError, StorageError,
};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 패턴 컴파일 실패
    #[error("pattern compile error: processor '{processor}': {reason}")]
    PatternCompile {
        /// 프로세서 이름
        processor: String,
        /// 실패 사유
        reason: String,
    },

    /// 캡처 그룹 누락 또는 숫자 변환 실패
    #[error("capture error: processor '{processor}' field '{field}': {reason}")]
    Capture {
        /// 프로세서 이름
        processor: String,
        /// 캡처 그룹 이름
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// tail 대상 파일 에러
    #[error("tail error: {path}: {reason}")]
    Tail {
        /// 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 이미 tail 중
    #[error("already tailing {path}")]
    AlreadyTailing {
        /// 현재 tail 중인 경로
        path: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 아이템 메타데이터 로딩 실패
    #[error("catalog error: {path}: {reason}")]
    Catalog {
        /// 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },
}

impl LogPipelineError {
    /// 라인 단위로 격리되는 에러인지 확인합니다.
    pub fn is_per_line(&self) -> bool {
        matches!(self, Self::Capture { .. } | Self::Storage(_))
    }
}

impl From<LogPipelineError> for DroptrackError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Storage(e) => DroptrackError::Storage(e),
            LogPipelineError::Config { field, reason } => {
                DroptrackError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Capture { field, reason, .. } => {
                DroptrackError::Parse(ParseError::InvalidNumber {
                    field,
                    value: reason,
                })
            }
            LogPipelineError::AlreadyTailing { .. } => {
                DroptrackError::Pipeline(PipelineError::AlreadyRunning)
            }
            other => DroptrackError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
