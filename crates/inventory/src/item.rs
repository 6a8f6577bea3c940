use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{ensure_range, normalize_code, optional_text, require_text};
use bof_core::{BusinessObject, DomainResult, EntityId, Filters, Record};

pub const DEFAULT_UNIT: &str = "unit";
const MAX_REORDER_LEVEL: i64 = 1_000_000_000;

/// Stock-keeping item. `code` is the SKU and is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub record: Record,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<EntityId>,
    pub unit_of_measure: String,
    pub reorder_level: i64,
    pub is_stockable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<EntityId>,
    #[serde(default = "default_unit")]
    pub unit_of_measure: String,
    #[serde(default)]
    pub reorder_level: i64,
    #[serde(default = "default_stockable")]
    pub is_stockable: bool,
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn default_stockable() -> bool {
    true
}

impl ItemDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: None,
            category_id: None,
            unit_of_measure: default_unit(),
            reorder_level: 0,
            is_stockable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<EntityId>>,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    pub reorder_level: Option<i64>,
    #[serde(default)]
    pub is_stockable: Option<bool>,
}

impl Item {
    pub fn in_category(category_id: EntityId) -> Filters {
        Filters::new().eq("category_id", category_id.get())
    }
}

impl BusinessObject for Item {
    type Draft = ItemDraft;
    type Patch = ItemPatch;

    const ENTITY_TYPE: &'static str = "inventory.item";
    const FIELDS: &'static [&'static str] = &[
        "code",
        "name",
        "description",
        "category_id",
        "unit_of_measure",
        "reorder_level",
        "is_stockable",
    ];
    const DEFAULT_ORDER: &'static [&'static str] = &["code"];
    const CODE_FIELD: Option<&'static str> = Some("code");

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: ItemDraft) -> DomainResult<Self> {
        Ok(Self {
            record: Record::pending(),
            code: normalize_code(&draft.code)?,
            name: require_text("name", &draft.name, 200)?,
            description: optional_text("description", draft.description.as_deref(), 2000)?,
            category_id: draft.category_id,
            unit_of_measure: require_text("unit_of_measure", &draft.unit_of_measure, 20)?.to_lowercase(),
            reorder_level: ensure_range("reorder_level", draft.reorder_level, 0, MAX_REORDER_LEVEL)?,
            is_stockable: draft.is_stockable,
        })
    }

    fn merge(&self, patch: &ItemPatch) -> DomainResult<Self> {
        let mut merged = Self::build(ItemDraft {
            code: pick(&self.code, &patch.code),
            name: pick(&self.name, &patch.name),
            description: pick_nullable(&self.description, &patch.description),
            category_id: pick_nullable(&self.category_id, &patch.category_id),
            unit_of_measure: pick(&self.unit_of_measure, &patch.unit_of_measure),
            reorder_level: pick(&self.reorder_level, &patch.reorder_level),
            is_stockable: pick(&self.is_stockable, &patch.is_stockable),
        })?;
        merged.record = self.record.clone();
        Ok(merged)
    }

    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }

    fn references(&self) -> Vec<(&'static str, EntityId)> {
        self.category_id.map(|id| ("category_id", id)).into_iter().collect()
    }
}
