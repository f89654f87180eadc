//! 인메모리 저장소 -- [`DropRepository`]의 기본 구현
//!
//! 프로세스 수명 동안만 유지됩니다. 아이템, 맵, 아이템 -> 맵 역방향
//! 인덱스를 각각 `RwLock`으로 보호합니다.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use droptrack_core::error::StorageError;
use droptrack_core::repository::DropRepository;
use droptrack_core::types::{GameMap, Item, ItemId, MapId};
use parking_lot::RwLock;

/// 인메모리 드롭 저장소
#[derive(Debug)]
pub struct InMemoryRepository {
    items: RwLock<HashMap<ItemId, Item>>,
    maps: RwLock<BTreeMap<MapId, GameMap>>,
    memberships: RwLock<HashMap<ItemId, BTreeSet<MapId>>>,
    next_map_id: AtomicU64,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            maps: RwLock::new(BTreeMap::new()),
            memberships: RwLock::new(HashMap::new()),
            next_map_id: AtomicU64::new(1),
        }
    }

    /// 저장된 아이템 전체를 식별자 순서로 반환합니다.
    pub fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.read().values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }
}

impl DropRepository for InMemoryRepository {
    fn find_item(&self, id: &ItemId) -> Result<Option<Item>, StorageError> {
        Ok(self.items.read().get(id).cloned())
    }

    fn save_item(&self, item: Item) -> Result<Item, StorageError> {
        self.items.write().insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn delete_item(&self, id: &ItemId) -> Result<(), StorageError> {
        self.items.write().remove(id);

        let Some(map_ids) = self.memberships.write().remove(id) else {
            return Ok(());
        };
        let mut maps = self.maps.write();
        for map_id in map_ids {
            if let Some(map) = maps.get_mut(&map_id) {
                map.remove_item(id);
            }
        }
        Ok(())
    }

    fn find_active_map(&self) -> Result<Option<GameMap>, StorageError> {
        let maps = self.maps.read();
        let active = maps
            .values()
            .filter(|m| m.is_active())
            .max_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(active.cloned())
    }

    fn save_map(&self, mut map: GameMap) -> Result<GameMap, StorageError> {
        let id = match map.id {
            Some(id) => id,
            None => {
                let id = MapId(self.next_map_id.fetch_add(1, Ordering::Relaxed));
                map.id = Some(id);
                id
            }
        };

        {
            let mut memberships = self.memberships.write();
            for item in map.items() {
                memberships.entry(item.clone()).or_default().insert(id);
            }
        }
        self.maps.write().insert(id, map.clone());
        Ok(map)
    }

    fn count_maps(&self) -> Result<u64, StorageError> {
        Ok(self.maps.read().len() as u64)
    }

    fn count_items(&self) -> Result<u64, StorageError> {
        Ok(self.items.read().len() as u64)
    }

    fn list_maps_with_items(&self) -> Result<Vec<GameMap>, StorageError> {
        let mut maps: Vec<GameMap> = self.maps.read().values().cloned().collect();
        maps.sort_by(|a, b| match (a.ended_at, b.ended_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.started_at.cmp(&a.started_at)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.started_at.cmp(&a.started_at),
        });
        Ok(maps)
    }

    fn maps_for_item(&self, id: &ItemId) -> Result<Vec<MapId>, StorageError> {
        Ok(self
            .memberships
            .read()
            .get(id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }
}
