//! 설정 관리 -- droptrack.toml 파싱 및 런타임 설정
//!
//! [`DroptrackConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DROPTRACK_TAILER_LOG_PATH=/path/to/UE_game.log` 형식)
//! 3. 설정 파일 (`droptrack.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), droptrack_core::error::DroptrackError> {
//! use droptrack_core::config::DroptrackConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DroptrackConfig::load("droptrack.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DroptrackConfig::parse("[tailer]\nfrom_end = false")?;
//! # Ok(())
//! # }
//! ```

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DroptrackError};

/// 게임 클라이언트 로그 라인 접두사
pub const GAME_LOG_PREFIX: &str = r"\[.*?\]GameLog: Display: \[Game\]\s*";

/// 추적 대상이 아닌 대기 장소(은신처) 씬 경로
pub const HIDEOUT_SCENE: &str = "/Game/Art/Maps/01SD/XZ_YuJinZhiXiBiNanSuo200/XZ_YuJinZhiXiBiNanSuo200.XZ_YuJinZhiXiBiNanSuo200";

/// 폴링 간격 허용 범위 (밀리초)
const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=60_000;

/// Droptrack 통합 설정
///
/// `droptrack.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DroptrackConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// tail 설정
    #[serde(default)]
    pub tailer: TailerConfig,
    /// 패턴 설정
    #[serde(default)]
    pub patterns: PatternConfig,
    /// 변경 알림 설정
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// 아이템 메타데이터 설정
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DroptrackConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DroptrackError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DroptrackError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DroptrackError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DroptrackError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DroptrackError> {
        toml::from_str(toml_str).map_err(|e| {
            DroptrackError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DROPTRACK_{SECTION}_{FIELD}`
    /// 예: `DROPTRACK_TAILER_POLL_INTERVAL_MS=250`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DROPTRACK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DROPTRACK_GENERAL_LOG_FORMAT");

        // Tailer
        override_string(&mut self.tailer.log_path, "DROPTRACK_TAILER_LOG_PATH");
        override_bool(&mut self.tailer.from_end, "DROPTRACK_TAILER_FROM_END");
        override_u64(
            &mut self.tailer.poll_interval_ms,
            "DROPTRACK_TAILER_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.tailer.read_buffer_size,
            "DROPTRACK_TAILER_READ_BUFFER_SIZE",
        );

        // Patterns
        override_bool(
            &mut self.patterns.bag_init_enabled,
            "DROPTRACK_PATTERNS_BAG_INIT_ENABLED",
        );
        override_string(&mut self.patterns.bag_init, "DROPTRACK_PATTERNS_BAG_INIT");
        override_string(
            &mut self.patterns.bag_modify,
            "DROPTRACK_PATTERNS_BAG_MODIFY",
        );
        override_string(&mut self.patterns.map_entry, "DROPTRACK_PATTERNS_MAP_ENTRY");
        override_string(&mut self.patterns.map_exit, "DROPTRACK_PATTERNS_MAP_EXIT");

        // Notifier
        override_usize(
            &mut self.notifier.backlog_size,
            "DROPTRACK_NOTIFIER_BACKLOG_SIZE",
        );

        // Catalog
        override_string(&mut self.catalog.path, "DROPTRACK_CATALOG_PATH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "DROPTRACK_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "DROPTRACK_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "DROPTRACK_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DroptrackError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if !POLL_INTERVAL_RANGE_MS.contains(&self.tailer.poll_interval_ms) {
            return Err(invalid(
                "tailer.poll_interval_ms",
                format!(
                    "must be between {} and {}",
                    POLL_INTERVAL_RANGE_MS.start(),
                    POLL_INTERVAL_RANGE_MS.end()
                ),
            ));
        }

        if self.tailer.read_buffer_size == 0 {
            return Err(invalid("tailer.read_buffer_size", "must be greater than 0"));
        }

        if self.notifier.backlog_size == 0 {
            return Err(invalid("notifier.backlog_size", "must be greater than 0"));
        }

        for (field, pattern) in [
            ("patterns.bag_modify", &self.patterns.bag_modify),
            ("patterns.map_entry", &self.patterns.map_entry),
            ("patterns.map_exit", &self.patterns.map_exit),
        ] {
            if pattern.is_empty() {
                return Err(invalid(field, "pattern must not be empty"));
            }
        }

        if self.patterns.bag_init_enabled && self.patterns.bag_init.is_empty() {
            return Err(invalid(
                "patterns.bag_init",
                "pattern must not be empty when bag_init is enabled",
            ));
        }

        if self.metrics.enabled {
            if self.metrics.endpoint != "/metrics" {
                return Err(invalid(
                    "metrics.endpoint",
                    "only '/metrics' is supported",
                ));
            }
            if self.metrics.listen_addr.parse::<IpAddr>().is_err() {
                return Err(invalid(
                    "metrics.listen_addr",
                    format!("'{}' is not an IP address", self.metrics.listen_addr),
                ));
            }
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> DroptrackError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// tail 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailerConfig {
    /// 대상 로그 파일 경로 (비어 있으면 시작 시 지정)
    pub log_path: String,
    /// 파일 끝에서 시작할지 여부
    pub from_end: bool,
    /// 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 읽기 버퍼 크기 (바이트)
    pub read_buffer_size: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            log_path: String::new(),
            from_end: true,
            poll_interval_ms: 100,
            read_buffer_size: 8192,
        }
    }
}

/// 패턴 설정
///
/// 캡처 그룹 이름은 `page_id`, `slot_id`, `config_base_id`, `num`입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// 초기 인벤토리 스냅샷 처리 여부
    pub bag_init_enabled: bool,
    /// 슬롯 초기화 라인 패턴
    pub bag_init: String,
    /// 슬롯 변경 라인 패턴
    pub bag_modify: String,
    /// 맵 진입 라인 패턴
    pub map_entry: String,
    /// 맵 퇴장 라인 패턴
    pub map_exit: String,
    /// 슬롯 초기화 우선순위
    pub bag_init_order: i32,
    /// 슬롯 변경 우선순위
    pub bag_modify_order: i32,
    /// 맵 진입 우선순위
    pub map_entry_order: i32,
    /// 맵 퇴장 우선순위
    pub map_exit_order: i32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            bag_init_enabled: false,
            bag_init: format!(
                r"{GAME_LOG_PREFIX}BagMgr@:InitBagData\s+PageId = (?P<page_id>\d+)\s+SlotId = (?P<slot_id>\d+)\s+ConfigBaseId = (?P<config_base_id>\d+)\s+Num = (?P<num>\d+)"
            ),
            bag_modify: format!(
                r"{GAME_LOG_PREFIX}BagMgr@:Modfy BagItem PageId = (?P<page_id>\d+) SlotId = (?P<slot_id>\d+) ConfigBaseId = (?P<config_base_id>\d+) Num = (?P<num>\d+)"
            ),
            map_entry: format!(
                r"PageApplyBase@ _UpdateGameEnd: LastSceneName = World'{HIDEOUT_SCENE}' NextSceneName = World'/Game/Art/Maps"
            ),
            map_exit: format!(r"NextSceneName = World'{HIDEOUT_SCENE}'"),
            bag_init_order: 10,
            bag_modify_order: 20,
            map_entry_order: 15,
            map_exit_order: 15,
        }
    }
}

/// 변경 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 늦게 구독한 소비자를 위한 최근 이벤트 보관 수
    pub backlog_size: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { backlog_size: 200 }
    }
}

/// 아이템 메타데이터 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// `full_table.json` 경로 (비어 있으면 빈 카탈로그)
    pub path: String,
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 노출 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
