//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`DroptrackConfig`]에서 tail, 패턴, 알림 관련
//! 섹션만 모아 파이프라인 내부에서 사용하는 형태로 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use droptrack_core::config::DroptrackConfig;
//! use droptrack_log_pipeline::config::PipelineConfig;
//!
//! let core_config = DroptrackConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use droptrack_core::config::{DroptrackConfig, PatternConfig};
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_READ_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 기본 tail 대상 (없으면 `start_tailing`에서 지정)
    pub log_path: Option<PathBuf>,
    /// 파일 끝에서 시작할지 여부
    pub from_end: bool,
    /// 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 읽기 버퍼 크기 (바이트)
    pub read_buffer_size: usize,
    /// 변경 알림 백로그 크기
    pub backlog_size: usize,
    /// 프로세서 패턴과 우선순위
    pub patterns: PatternConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&DroptrackConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &DroptrackConfig) -> Self {
        let log_path = if core.tailer.log_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&core.tailer.log_path))
        };

        Self {
            log_path,
            from_end: core.tailer.from_end,
            poll_interval_ms: core.tailer.poll_interval_ms,
            read_buffer_size: core.tailer.read_buffer_size,
            backlog_size: core.notifier.backlog_size,
            patterns: core.patterns.clone(),
        }
    }

    /// 폴링 간격을 `Duration`으로 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(LogPipelineError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            });
        }

        if self.read_buffer_size == 0 || self.read_buffer_size > MAX_READ_BUFFER_SIZE {
            return Err(LogPipelineError::Config {
                field: "read_buffer_size".to_owned(),
                reason: format!("must be 1-{MAX_READ_BUFFER_SIZE}"),
            });
        }

        if self.backlog_size == 0 {
            return Err(LogPipelineError::Config {
                field: "backlog_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if let Some(path) = &self.log_path
            && path.as_os_str().is_empty()
        {
            return Err(LogPipelineError::Config {
                field: "log_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 tail 대상을 설정합니다.
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = Some(path.into());
        self
    }

    /// 시작 위치를 설정합니다.
    pub fn from_end(mut self, from_end: bool) -> Self {
        self.config.from_end = from_end;
        self
    }

    /// 폴링 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 읽기 버퍼 크기를 설정합니다.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// 변경 알림 백로그 크기를 설정합니다.
    pub fn backlog_size(mut self, size: usize) -> Self {
        self.config.backlog_size = size;
        self
    }

    /// 패턴 설정을 교체합니다.
    pub fn patterns(mut self, patterns: PatternConfig) -> Self {
        self.config.patterns = patterns;
        self
    }

    /// 슬롯 초기화 프로세서를 켜거나 끕니다.
    pub fn bag_init_enabled(mut self, enabled: bool) -> Self {
        self.config.patterns.bag_init_enabled = enabled;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
