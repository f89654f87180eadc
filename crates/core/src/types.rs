//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 로그 라인, 인벤토리 슬롯 아이템, 맵(플레이 세션)을 정의합니다.
//! 각 모듈은 이 타입들을 사용하여 상태와 이벤트를 교환합니다.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 로그 엔트리
///
/// tail 중 관찰된 한 줄을 나타냅니다. 라인 번호는 1부터 시작하며
/// 파일 로테이션이 감지되면 다시 1부터 시작합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 원본 라인 (개행 문자 제외)
    pub raw_line: String,
    /// 라인 번호 (1부터 시작)
    pub line_number: u64,
    /// 관찰 시각
    pub observed_at: DateTime<Utc>,
}

impl LogEntry {
    /// 현재 시각으로 새 로그 엔트리를 생성합니다.
    pub fn new(raw_line: impl Into<String>, line_number: u64) -> Self {
        Self {
            raw_line: raw_line.into(),
            line_number,
            observed_at: Utc::now(),
        }
    }

    /// 관찰 시각을 지정하여 로그 엔트리를 생성합니다.
    pub fn observed(raw_line: impl Into<String>, line_number: u64, at: DateTime<Utc>) -> Self {
        Self {
            raw_line: raw_line.into(),
            line_number,
            observed_at: at,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.line_number, self.raw_line)
    }
}

/// 아이템 식별자 -- 특정 인벤토리 슬롯의 내용물
///
/// (page_id, slot_id, config_base_id) 세 값이 모두 같아야 같은 아이템입니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId {
    /// 인벤토리 페이지
    pub page_id: String,
    /// 페이지 내 슬롯
    pub slot_id: String,
    /// 아이템 종류 (메타데이터 테이블 키)
    pub config_base_id: String,
}

impl ItemId {
    /// 새 아이템 식별자를 생성합니다.
    pub fn new(
        page_id: impl Into<String>,
        slot_id: impl Into<String>,
        config_base_id: impl Into<String>,
    ) -> Self {
        Self {
            page_id: page_id.into(),
            slot_id: slot_id.into(),
            config_base_id: config_base_id.into(),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page={} slot={} cfg={}",
            self.page_id, self.slot_id, self.config_base_id
        )
    }
}

/// 인벤토리 슬롯 아이템
///
/// `num`은 마지막으로 관찰된 수량, `total`은 지금까지의 변화량 누적입니다.
/// `total`은 덮어쓰지 않고 항상 delta로만 갱신됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// 식별자
    pub id: ItemId,
    /// 현재 수량
    pub num: i64,
    /// 누적 획득량
    pub total: i64,
}

impl Item {
    /// 수량과 누적값을 지정하여 아이템을 생성합니다.
    pub fn new(id: ItemId, num: i64, total: i64) -> Self {
        Self { id, num, total }
    }

    /// 처음 관찰된 아이템을 생성합니다.
    ///
    /// 이전 기준값이 없으므로 초기 수량 전체를 획득량으로 계산합니다.
    pub fn first_seen(id: ItemId, num: i64) -> Self {
        Self {
            id,
            num,
            total: num,
        }
    }

    /// 새 수량을 반영하고 delta(`new_num - 이전 num`)를 반환합니다.
    pub fn observe(&mut self, new_num: i64) -> i64 {
        let delta = new_num - self.num;
        self.num = new_num;
        self.total += delta;
        delta
    }

    /// 아이템 종류 ID를 반환합니다.
    pub fn config_base_id(&self) -> &str {
        &self.id.config_base_id
    }
}

/// 맵 식별자 (저장소가 순차 발급)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MapId(pub u64);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// 맵 -- 한 번의 플레이 세션/레벨 인스턴스
///
/// 상태 전환:
/// - 생성 시 `Open` (`ended_at == None`)
/// - 종료 이벤트 시 `Closed` (`ended_at` 설정, 종결 상태)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    /// 저장 전에는 `None`
    pub id: Option<MapId>,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각 (`None`이면 진행 중)
    pub ended_at: Option<DateTime<Utc>>,
    /// 이 맵에서 변경된 아이템 목록
    items: BTreeSet<ItemId>,
}

impl GameMap {
    /// 새 맵을 엽니다.
    pub fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            started_at,
            ended_at: None,
            items: BTreeSet::new(),
        }
    }

    /// 맵을 종료합니다. 이미 종료된 맵이면 기존 종료 시각을 유지합니다.
    pub fn close(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
    }

    /// 진행 중인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// 아이템을 멤버로 추가합니다. 새로 추가된 경우 `true`를 반환합니다.
    pub fn add_item(&mut self, item: ItemId) -> bool {
        self.items.insert(item)
    }

    /// 멤버에서 제거합니다. 실제로 제거된 경우 `true`를 반환합니다.
    pub fn remove_item(&mut self, item: &ItemId) -> bool {
        self.items.remove(item)
    }

    /// 멤버 여부를 확인합니다.
    pub fn contains(&self, item: &ItemId) -> bool {
        self.items.contains(item)
    }

    /// 멤버 아이템을 순회합니다.
    pub fn items(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter()
    }

    /// 멤버 아이템 수를 반환합니다.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
