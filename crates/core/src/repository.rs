//! 저장소 포트 -- 아이템/맵 영속성과 아이템 메타데이터 조회
//!
//! 코어는 이 trait들만 사용하며 구현은 외부 협력자가 제공합니다.
//! 모든 조회는 값(스냅샷)을 반환하므로 호출자는 저장소 상태를
//! 직접 변경할 수 없습니다.

use crate::error::StorageError;
use crate::types::{GameMap, Item, ItemId, MapId};

/// 아이템/맵 영속성 포트
///
/// 하나의 변경 단계 안에서 read-your-writes 일관성을 보장해야 합니다.
pub trait DropRepository: Send + Sync {
    /// 식별자로 아이템을 조회합니다.
    fn find_item(&self, id: &ItemId) -> Result<Option<Item>, StorageError>;

    /// 아이템을 저장(upsert)하고 저장된 값을 반환합니다.
    fn save_item(&self, item: Item) -> Result<Item, StorageError>;

    /// 아이템을 삭제합니다. 관리/롤백 용도이며 맵 멤버십도 함께 제거됩니다.
    fn delete_item(&self, id: &ItemId) -> Result<(), StorageError>;

    /// 가장 최근에 시작된 진행 중 맵을 조회합니다.
    fn find_active_map(&self) -> Result<Option<GameMap>, StorageError>;

    /// 맵을 저장합니다.
    ///
    /// `id`가 없으면 새 ID를 발급합니다. 멤버 아이템의 역방향 인덱스
    /// (아이템 → 맵)도 함께 갱신됩니다.
    fn save_map(&self, map: GameMap) -> Result<GameMap, StorageError>;

    /// 저장된 맵 수를 반환합니다.
    fn count_maps(&self) -> Result<u64, StorageError>;

    /// 저장된 아이템 수를 반환합니다.
    fn count_items(&self) -> Result<u64, StorageError>;

    /// 모든 맵을 종료 시각 내림차순으로 반환합니다. 진행 중 맵은 마지막입니다.
    fn list_maps_with_items(&self) -> Result<Vec<GameMap>, StorageError>;

    /// 아이템이 속한 맵 ID 목록을 반환합니다.
    fn maps_for_item(&self, id: &ItemId) -> Result<Vec<MapId>, StorageError>;
}

/// 아이템 메타데이터 조회 포트
///
/// 통계와 알림 소비자만 사용하며 변경 경로에서는 사용하지 않습니다.
pub trait ItemLookup: Send + Sync {
    /// 단가를 조회합니다. 모르는 ID면 `None`입니다.
    fn price_for(&self, config_base_id: &str) -> Option<f64>;

    /// 표시 이름을 조회합니다. 모르는 ID면 ID 자체를 반환합니다.
    fn display_name_for(&self, config_base_id: &str) -> String;
}
