//! 드롭 이벤트 투영
//!
//! 집계기가 내보낸 [`ItemDropEvent`]에 아이템 메타데이터를 붙여
//! 구독자용 [`DropEvent`]로 바꾸고 변경 알림기로 전달합니다.

use std::sync::Arc;

use droptrack_core::event::{DropEvent, ItemDropEvent, MapEvent};
use droptrack_core::repository::ItemLookup;

use crate::aggregator::EventSink;
use crate::notifier::ChangeNotifier;

/// 집계 이벤트를 구독자용 뷰로 변환합니다.
pub fn project(event: &ItemDropEvent, lookup: &dyn ItemLookup) -> DropEvent {
    let config_base_id = event.item.config_base_id();
    let name = lookup.display_name_for(config_base_id);

    DropEvent {
        time: event.metadata.timestamp,
        label: format!("{name} ({config_base_id})"),
        config_base_id: config_base_id.to_owned(),
        delta: event.delta,
        total: event.item.total,
        unit_price: lookup.price_for(config_base_id),
        map_started_at: event.map_started_at,
    }
}

/// 집계 이벤트를 알림기로 전달하는 [`EventSink`]
pub struct DropProjector {
    lookup: Arc<dyn ItemLookup>,
    drops: ChangeNotifier<DropEvent>,
    maps: ChangeNotifier<MapEvent>,
}

impl DropProjector {
    /// 새 프로젝터를 생성합니다.
    pub fn new(
        lookup: Arc<dyn ItemLookup>,
        drops: ChangeNotifier<DropEvent>,
        maps: ChangeNotifier<MapEvent>,
    ) -> Self {
        Self {
            lookup,
            drops,
            maps,
        }
    }
}

impl EventSink for DropProjector {
    fn item_dropped(&self, event: ItemDropEvent) {
        self.drops.broadcast(project(&event, self.lookup.as_ref()));
    }

    fn map_changed(&self, event: MapEvent) {
        self.maps.broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemCatalog;
    use chrono::Utc;
    use droptrack_core::event::{EventMetadata, MODULE_LOG_PIPELINE, MapPhase};
    use droptrack_core::types::{Item, ItemId, MapId};

    fn catalog() -> ItemCatalog {
        ItemCatalog::from_json_str(
            r#"{"5028": {"name": "Flame Elementium", "price": 0.5, "type": "currency", "last_update": 0}}"#,
        )
        .unwrap()
    }

    fn drop_event(cfg: &str, delta: i64, total: i64) -> ItemDropEvent {
        let started = Utc::now();
        ItemDropEvent::new(
            Item::new(ItemId::new("102", "11", cfg), 617, total),
            delta,
            Some((MapId(1), started)),
            EventMetadata::new(MODULE_LOG_PIPELINE, 3, Utc::now()),
        )
    }

    #[test]
    fn project_known_item() {
        let event = drop_event("5028", 4, 10);
        let projected = project(&event, &catalog());

        assert_eq!(projected.label, "Flame Elementium (5028)");
        assert_eq!(projected.delta, 4);
        assert_eq!(projected.total, 10);
        assert_eq!(projected.unit_price, Some(0.5));
        assert_eq!(projected.time, event.metadata.timestamp);
        assert_eq!(projected.map_started_at, event.map_started_at);
        assert!((projected.delta_value() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn project_unknown_item_uses_id() {
        let projected = project(&drop_event("7777", -1, 0), &catalog());
        assert_eq!(projected.label, "7777 (7777)");
        assert_eq!(projected.unit_price, None);
        assert_eq!(projected.delta_value(), 0.0);
    }

    #[test]
    fn projector_broadcasts_to_notifiers() {
        let drops = ChangeNotifier::new(10);
        let maps = ChangeNotifier::new(10);
        let projector = DropProjector::new(Arc::new(catalog()), drops.clone(), maps.clone());

        projector.item_dropped(drop_event("5028", 1, 1));
        projector.map_changed(MapEvent::new(
            MapId(1),
            MapPhase::Opened,
            EventMetadata::new(MODULE_LOG_PIPELINE, 1, Utc::now()),
        ));

        assert_eq!(drops.snapshot().len(), 1);
        assert_eq!(maps.snapshot()[0].phase, MapPhase::Opened);
    }
}
