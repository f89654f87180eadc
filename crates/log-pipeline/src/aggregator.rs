//! 드롭 집계기 -- 아이템 수량과 맵 수명 주기를 갱신합니다.
//!
//! [`DropAggregator`]는 매칭된 라인을 받아 저장소 상태를 바꾸고,
//! 수량 변경마다 [`ItemDropEvent`]를 [`EventSink`]로 내보냅니다.
//!
//! # 수량 변경 단계
//! 1. 식별자로 아이템 조회 (없으면 이전 수량 0)
//! 2. `delta = 새 수량 - 이전 수량`
//! 3. 아이템 저장 (신규면 `total = 새 수량`, 기존이면 `total += delta`)
//! 4. 활성 맵이 있으면 멤버로 추가 (이미 멤버면 생략)
//! 5. 이벤트 발행
//!
//! 3~4 단계 중 하나라도 실패하면 아이템을 이전 상태로 되돌리고 이벤트를 내보내지 않습니다.

use std::sync::Arc;

use droptrack_core::error::StorageError;
use droptrack_core::event::{
    EventMetadata, ItemDropEvent, MODULE_LOG_PIPELINE, MapEvent, MapPhase,
};
use droptrack_core::metrics as m;
use droptrack_core::repository::DropRepository;
use droptrack_core::types::{GameMap, Item, ItemId, LogEntry, MapId};
use parking_lot::Mutex;
use regex::Captures;
use tracing::{debug, error, info, warn};

use crate::error::LogPipelineError;

/// 집계 결과를 받는 쪽
pub trait EventSink: Send + Sync {
    /// 아이템 수량 변경 이벤트를 받습니다.
    fn item_dropped(&self, event: ItemDropEvent);

    /// 맵 열림/닫힘 이벤트를 받습니다.
    fn map_changed(&self, _event: MapEvent) {}
}

/// 맵 진입 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntryOutcome {
    /// 새로 열린 맵
    pub opened: MapId,
    /// 진입 시점에 아직 열려 있던 이전 맵
    pub still_open: Option<MapId>,
}

impl MapEntryOutcome {
    /// 열린 맵이 둘 이상 겹쳤는지 확인합니다.
    pub fn is_overlapping(&self) -> bool {
        self.still_open.is_some()
    }
}

/// 캡처에서 꺼낸 슬롯 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagSlot {
    /// 아이템 식별자
    pub id: ItemId,
    /// 관찰된 수량
    pub num: i64,
}

impl BagSlot {
    /// `page_id`, `slot_id`, `config_base_id`, `num` 캡처 그룹에서 슬롯을 만듭니다.
    pub fn from_captures(processor: &str, caps: &Captures<'_>) -> Result<Self, LogPipelineError> {
        let field = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str())
                .ok_or_else(|| LogPipelineError::Capture {
                    processor: processor.to_owned(),
                    field: name.to_owned(),
                    reason: "missing capture group".to_owned(),
                })
        };

        let raw_num = field("num")?;
        let num = raw_num
            .parse::<i64>()
            .map_err(|e| LogPipelineError::Capture {
                processor: processor.to_owned(),
                field: "num".to_owned(),
                reason: format!("invalid number '{raw_num}': {e}"),
            })?;

        Ok(Self {
            id: ItemId::new(field("page_id")?, field("slot_id")?, field("config_base_id")?),
            num,
        })
    }
}

/// 드롭 집계기
pub struct DropAggregator {
    repository: Arc<dyn DropRepository>,
    sink: Arc<dyn EventSink>,
    /// 변경 단계 직렬화
    write_lock: Mutex<()>,
}

impl DropAggregator {
    /// 새 집계기를 생성합니다.
    pub fn new(repository: Arc<dyn DropRepository>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            repository,
            sink,
            write_lock: Mutex::new(()),
        }
    }

    /// 저장소 참조를 반환합니다.
    pub fn repository(&self) -> &Arc<dyn DropRepository> {
        &self.repository
    }

    /// 슬롯 초기화 라인을 처리합니다.
    ///
    /// 해당 식별자의 아이템을 `num`, `total = 0`으로 덮어씁니다. 맵과 무관하며
    /// 이벤트를 내보내지 않습니다.
    pub fn on_bag_init(&self, entry: &LogEntry, caps: &Captures<'_>) -> Result<Item, LogPipelineError> {
        let slot = BagSlot::from_captures("bag_init", caps)?;
        let _guard = self.write_lock.lock();

        let item = self
            .repository
            .save_item(Item::new(slot.id, slot.num, 0))?;
        debug!(
            line = entry.line_number,
            item = %item.id,
            num = item.num,
            "inventory slot initialized"
        );
        Ok(item)
    }

    /// 슬롯 수량 변경 라인을 처리합니다.
    pub fn on_bag_modify(
        &self,
        entry: &LogEntry,
        caps: &Captures<'_>,
    ) -> Result<ItemDropEvent, LogPipelineError> {
        let slot = BagSlot::from_captures("bag_modify", caps)?;
        let _guard = self.write_lock.lock();

        let previous = self.repository.find_item(&slot.id)?;
        let (item, delta) = match previous.clone() {
            Some(mut existing) => {
                let delta = existing.observe(slot.num);
                (existing, delta)
            }
            None => (Item::first_seen(slot.id.clone(), slot.num), slot.num),
        };
        let active = self.repository.find_active_map()?;

        let saved = self.repository.save_item(item)?;
        if let Some(map) = &active
            && let Err(e) = self.add_membership(map, &slot.id)
        {
            self.roll_back(&slot.id, previous);
            return Err(e);
        }

        let event = ItemDropEvent::new(
            saved,
            delta,
            active.and_then(|map| map.id.map(|id| (id, map.started_at))),
            metadata(entry),
        );
        debug!(
            line = entry.line_number,
            item = %event.item.id,
            delta,
            total = event.item.total,
            "item quantity changed"
        );
        metrics::counter!(m::DROP_EVENTS_TOTAL).increment(1);
        self.sink.item_dropped(event.clone());
        Ok(event)
    }

    /// 맵 진입 라인을 처리합니다.
    ///
    /// 항상 새 맵을 엽니다. 이전 맵이 열려 있어도 닫지 않으며,
    /// 그 경우 결과의 `still_open`으로 알려줍니다.
    pub fn on_map_entry(&self, entry: &LogEntry) -> Result<MapEntryOutcome, LogPipelineError> {
        let _guard = self.write_lock.lock();

        let still_open = self.repository.find_active_map()?.and_then(|map| map.id);
        let opened = self
            .repository
            .save_map(GameMap::open(entry.observed_at))?
            .id
            .ok_or_else(|| StorageError::Query("saved map has no id".to_owned()))?;

        if let Some(previous) = still_open {
            warn!(
                line = entry.line_number,
                opened = %opened,
                still_open = %previous,
                "map entered while another map is still open"
            );
            metrics::counter!(m::MAPS_OVERLAPPING_TOTAL).increment(1);
        }
        info!(line = entry.line_number, map = %opened, "map opened");
        metrics::counter!(m::MAPS_OPENED_TOTAL).increment(1);
        self.sink
            .map_changed(MapEvent::new(opened, MapPhase::Opened, metadata(entry)));

        Ok(MapEntryOutcome { opened, still_open })
    }

    /// 맵 퇴장 라인을 처리합니다. 활성 맵이 없으면 아무것도 하지 않습니다.
    pub fn on_map_exit(&self, entry: &LogEntry) -> Result<Option<MapId>, LogPipelineError> {
        let _guard = self.write_lock.lock();

        let Some(mut map) = self.repository.find_active_map()? else {
            debug!(line = entry.line_number, "map exit without an active map");
            return Ok(None);
        };

        map.close(entry.observed_at);
        let closed = self.repository.save_map(map)?.id;
        if let Some(id) = closed {
            info!(line = entry.line_number, map = %id, "map closed");
            metrics::counter!(m::MAPS_CLOSED_TOTAL).increment(1);
            self.sink
                .map_changed(MapEvent::new(id, MapPhase::Closed, metadata(entry)));
        }
        Ok(closed)
    }

    fn add_membership(&self, map: &GameMap, item: &ItemId) -> Result<(), LogPipelineError> {
        if map.contains(item) {
            return Ok(());
        }
        let mut updated = map.clone();
        updated.add_item(item.clone());
        self.repository.save_map(updated)?;
        Ok(())
    }

    fn roll_back(&self, id: &ItemId, previous: Option<Item>) {
        metrics::counter!(m::ROLLBACKS_TOTAL).increment(1);
        let restored = match previous {
            Some(item) => self.repository.save_item(item).map(|_| ()),
            None => self.repository.delete_item(id),
        };
        if let Err(e) = restored {
            error!(item = %id, error = %e, "failed to roll back item after map update failure");
        }
    }
}

fn metadata(entry: &LogEntry) -> EventMetadata {
    EventMetadata::new(MODULE_LOG_PIPELINE, entry.line_number, entry.observed_at)
}
