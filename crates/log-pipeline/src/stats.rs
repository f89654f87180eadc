//! 드롭 통계 -- 저장소 상태에서 수익과 맵 통계를 계산합니다.
//!
//! 수익은 맵 멤버십마다 `단가 x 누적 획득량`을 더한 값입니다. 한 아이템이
//! 여러 맵에 속하면 그만큼 여러 번 계산됩니다.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use droptrack_core::error::StorageError;
use droptrack_core::repository::{DropRepository, ItemLookup};
use droptrack_core::types::GameMap;

/// 드롭 통계 조회기
#[derive(Clone)]
pub struct DropStats {
    repository: Arc<dyn DropRepository>,
    lookup: Arc<dyn ItemLookup>,
}

impl DropStats {
    /// 새 통계 조회기를 생성합니다.
    pub fn new(repository: Arc<dyn DropRepository>, lookup: Arc<dyn ItemLookup>) -> Self {
        Self { repository, lookup }
    }

    /// 전체 세션 수익
    pub fn session_revenue(&self) -> Result<f64, StorageError> {
        let mut revenue = 0.0;
        for map in self.repository.list_maps_with_items()? {
            revenue += self.map_revenue(&map)?;
        }
        Ok(revenue)
    }

    /// 진행 중 맵의 수익 (활성 맵이 없으면 0)
    pub fn current_map_revenue(&self) -> Result<f64, StorageError> {
        match self.repository.find_active_map()? {
            Some(map) => self.map_revenue(&map),
            None => Ok(0.0),
        }
    }

    /// 지금까지 열린 맵 수
    pub fn maps_completed(&self) -> Result<u64, StorageError> {
        self.repository.count_maps()
    }

    /// 진행 중 맵에 머문 시간 (활성 맵이 없으면 0)
    pub fn time_in_active_map(&self, now: DateTime<Utc>) -> Result<Duration, StorageError> {
        Ok(self
            .repository
            .find_active_map()?
            .map(|map| (now - map.started_at).max(Duration::zero()))
            .unwrap_or_else(Duration::zero))
    }

    fn map_revenue(&self, map: &GameMap) -> Result<f64, StorageError> {
        let mut revenue = 0.0;
        for id in map.items() {
            let Some(item) = self.repository.find_item(id)? else {
                continue;
            };
            if let Some(price) = self.lookup.price_for(item.config_base_id()) {
                revenue += price * item.total as f64;
            }
        }
        Ok(revenue)
    }
}
