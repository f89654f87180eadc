//! 아이템 카탈로그 -- `full_table.json` 메타데이터 조회
//!
//! 파일은 `config_base_id`를 키로 하는 JSON 객체입니다.
//!
//! ```json
//! {
//!   "5028": { "name": "Flame Elementium", "price": 0.12, "type": "currency", "last_update": 1730000000 }
//! }
//! ```
//!
//! 알 수 없는 필드는 무시합니다.

use std::collections::HashMap;
use std::path::Path;

use droptrack_core::repository::ItemLookup;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LogPipelineError;

/// 아이템 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// 가격 출처
    #[serde(default)]
    pub from: Option<String>,
    /// 마지막 거래 시각 (unix 초)
    #[serde(default)]
    pub last_time: Option<i64>,
    /// 마지막 갱신 시각 (unix 초)
    #[serde(default)]
    pub last_update: i64,
    /// 표시 이름
    pub name: String,
    /// 단가
    #[serde(default)]
    pub price: f64,
    /// 분류
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// 아이템 카탈로그
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    entries: HashMap<String, ItemMeta>,
}

impl ItemCatalog {
    /// 빈 카탈로그를 생성합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// JSON 문자열에서 카탈로그를 생성합니다.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, ItemMeta> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// 파일에서 카탈로그를 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        let catalog_err = |reason: String| LogPipelineError::Catalog {
            path: path.display().to_string(),
            reason,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| catalog_err(e.to_string()))?;
        let catalog = Self::from_json_str(&content).map_err(|e| catalog_err(e.to_string()))?;

        info!(path = %path.display(), items = catalog.len(), "item catalog loaded");
        Ok(catalog)
    }

    /// 메타데이터를 조회합니다.
    pub fn get(&self, config_base_id: &str) -> Option<&ItemMeta> {
        self.entries.get(config_base_id)
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ItemLookup for ItemCatalog {
    fn price_for(&self, config_base_id: &str) -> Option<f64> {
        self.get(config_base_id).map(|meta| meta.price)
    }

    fn display_name_for(&self, config_base_id: &str) -> String {
        self.get(config_base_id)
            .map(|meta| meta.name.clone())
            .unwrap_or_else(|| config_base_id.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "5028": {
            "from": "market",
            "last_time": 1730700000,
            "last_update": 1730700100,
            "name": "Flame Elementium",
            "price": 0.5,
            "type": "currency",
            "icon": "ignored.png"
        },
        "3001": { "name": "Ember", "price": 2.0, "type": "material", "last_update": 0 }
    }"#;

    #[test]
    fn parses_entries_and_ignores_unknown_fields() {
        let catalog = ItemCatalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);

        let meta = catalog.get("5028").unwrap();
        assert_eq!(meta.name, "Flame Elementium");
        assert_eq!(meta.kind, "currency");
        assert_eq!(meta.from.as_deref(), Some("market"));
        assert_eq!(meta.last_time, Some(1_730_700_000));

        let ember = catalog.get("3001").unwrap();
        assert!(ember.from.is_none());
        assert!(ember.last_time.is_none());
    }

    #[test]
    fn lookup_known_and_unknown_ids() {
        let catalog = ItemCatalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalog.price_for("3001"), Some(2.0));
        assert_eq!(catalog.display_name_for("3001"), "Ember");

        assert_eq!(catalog.price_for("9999"), None);
        assert_eq!(catalog.display_name_for("9999"), "9999");
    }

    #[test]
    fn empty_catalog_falls_back_to_ids() {
        let catalog = ItemCatalog::empty();
        assert!(catalog.is_empty());
        assert_eq!(catalog.display_name_for("5028"), "5028");
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(ItemCatalog::from_json_str("{ not json").is_err());
        assert!(ItemCatalog::from_json_str(r#"{"1": {"price": 1.0}}"#).is_err());
    }

    #[tokio::test]
    async fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full_table.json");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let catalog = ItemCatalog::load(&path).await.unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn load_missing_file_is_catalog_error() {
        let err = ItemCatalog::load("/nonexistent/full_table.json")
            .await
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::Catalog { .. }));
    }
}
