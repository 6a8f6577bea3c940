use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{normalize_optional_code, optional_text, require_text};
use bof_core::{BusinessObject, DomainResult, EntityId, Record};

/// Node of the item category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(flatten)]
    pub record: Record,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            description: None,
            parent_id: None,
        }
    }

    pub fn under(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<EntityId>>,
}

impl CategoryPatch {
    /// Patch that only moves the category.
    pub fn reparent(parent_id: Option<EntityId>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }
}

impl BusinessObject for Category {
    type Draft = CategoryDraft;
    type Patch = CategoryPatch;

    const ENTITY_TYPE: &'static str = "inventory.category";
    const FIELDS: &'static [&'static str] = &["name", "code", "description", "parent_id"];
    const CODE_FIELD: Option<&'static str> = Some("code");
    const PARENT_FIELD: Option<&'static str> = Some("parent_id");

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: CategoryDraft) -> DomainResult<Self> {
        Ok(Self {
            record: Record::pending(),
            name: require_text("name", &draft.name, 120)?,
            code: normalize_optional_code(draft.code.as_deref())?,
            description: optional_text("description", draft.description.as_deref(), 1000)?,
            parent_id: draft.parent_id,
        })
    }

    fn merge(&self, patch: &CategoryPatch) -> DomainResult<Self> {
        let mut merged = Self::build(CategoryDraft {
            name: pick(&self.name, &patch.name),
            code: pick_nullable(&self.code, &patch.code),
            description: pick_nullable(&self.description, &patch.description),
            parent_id: pick_nullable(&self.parent_id, &patch.parent_id),
        })?;
        merged.record = self.record.clone();
        Ok(merged)
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn parent_id(&self) -> Option<EntityId> {
        self.parent_id
    }
}
