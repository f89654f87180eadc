//! 이벤트 -- 도메인 변경 알림의 기본 단위
//!
//! 집계기는 아이템 수량이 바뀔 때마다 [`ItemDropEvent`]를 만들고,
//! 변경 알림기는 이를 구독자용 뷰인 [`DropEvent`]로 투영하여 전달합니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터입니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Item, MapId};

/// 로그 파이프라인 모듈명
pub const MODULE_LOG_PIPELINE: &str = "log-pipeline";

/// 아이템 드롭 이벤트 타입
pub const EVENT_TYPE_ITEM_DROP: &str = "item_drop";
/// 맵 수명 주기 이벤트 타입
pub const EVENT_TYPE_MAP: &str = "map";

/// 이벤트 메타데이터
///
/// 발생 시각, 생성 모듈, 원본 로그 라인 번호를 담습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: DateTime<Utc>,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 이벤트를 만든 로그 라인 번호
    pub line_number: u64,
}

impl EventMetadata {
    /// 새 메타데이터를 생성합니다.
    pub fn new(
        source_module: impl Into<String>,
        line_number: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            source_module: source_module.into(),
            line_number,
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} line={}",
            self.timestamp.to_rfc3339(),
            self.source_module,
            self.line_number,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅에 사용)
    fn event_type(&self) -> &str;
}

/// 아이템 수량 변경 이벤트
///
/// 한 번의 "modify" 관찰을 나타냅니다. `item`은 변경 후 상태이며
/// `delta`는 `새 수량 - 이전 수량`입니다. 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDropEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 변경 후 아이템
    pub item: Item,
    /// 부호 있는 변화량
    pub delta: i64,
    /// 변경 시점의 활성 맵
    pub map_id: Option<MapId>,
    /// 활성 맵 시작 시각
    pub map_started_at: Option<DateTime<Utc>>,
}

impl ItemDropEvent {
    /// 새 드롭 이벤트를 생성합니다.
    pub fn new(
        item: Item,
        delta: i64,
        active_map: Option<(MapId, DateTime<Utc>)>,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata,
            item,
            delta,
            map_id: active_map.map(|(id, _)| id),
            map_started_at: active_map.map(|(_, at)| at),
        }
    }
}

impl Event for ItemDropEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_ITEM_DROP
    }
}

impl fmt::Display for ItemDropEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ItemDropEvent[{}] {} delta={:+} total={}",
            &self.id[..8.min(self.id.len())],
            self.item.id,
            self.delta,
            self.item.total,
        )
    }
}

/// 맵 수명 주기 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapPhase {
    /// 맵 진입
    Opened,
    /// 맵 퇴장
    Closed,
}

/// 맵 열림/닫힘 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 대상 맵
    pub map_id: MapId,
    /// 단계
    pub phase: MapPhase,
}

impl MapEvent {
    /// 새 맵 이벤트를 생성합니다.
    pub fn new(map_id: MapId, phase: MapPhase, metadata: EventMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata,
            map_id,
            phase,
        }
    }
}

impl Event for MapEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_MAP
    }
}

/// 구독자에게 전달되는 드롭 이벤트 뷰
///
/// 표시 이름과 단가는 아이템 메타데이터 조회 결과로 채워집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    /// 관찰 시각
    pub time: DateTime<Utc>,
    /// `"<표시 이름> (<config_base_id>)"`
    pub label: String,
    /// 아이템 종류 ID
    pub config_base_id: String,
    /// 부호 있는 변화량
    pub delta: i64,
    /// 변경 후 누적 획득량
    pub total: i64,
    /// 단가 (메타데이터에 없으면 `None`)
    pub unit_price: Option<f64>,
    /// 활성 맵 시작 시각
    pub map_started_at: Option<DateTime<Utc>>,
}

impl DropEvent {
    /// 알려진 단가로 계산한 이번 변화량의 가치
    pub fn delta_value(&self) -> f64 {
        self.unit_price.unwrap_or(0.0) * self.delta as f64
    }
}

impl fmt::Display for DropEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:+} (total {})", self.label, self.delta, self.total)
    }
}
