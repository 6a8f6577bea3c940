use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{ensure_range, normalize_optional_code, optional_text, require_text};
use bof_core::{BusinessObject, DomainError, DomainResult, EntityId, Record};

pub const DEFAULT_SEQUENCE: i64 = 10;

/// Navigation entry of a tenant's menu tree.
///
/// `module_code` names the [`Module`](crate::Module) that owns the entry;
/// the reference is by code so menus survive module reinstallation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(flatten)]
    pub record: Record,
    pub name: String,
    pub code: Option<String>,
    pub route: Option<String>,
    pub icon: Option<String>,
    pub sequence: i64,
    pub module_code: Option<String>,
    pub parent_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemDraft {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_sequence")]
    pub sequence: i64,
    #[serde(default)]
    pub module_code: Option<String>,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
}

fn default_sequence() -> i64 {
    DEFAULT_SEQUENCE
}

impl MenuItemDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            route: None,
            icon: None,
            sequence: DEFAULT_SEQUENCE,
            module_code: None,
            parent_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub route: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub module_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<EntityId>>,
}

/// Absolute route path without whitespace, e.g. `/sales/orders`.
fn route(raw: Option<&str>) -> DomainResult<Option<String>> {
    let Some(path) = optional_text("route", raw, 255)? else {
        return Ok(None);
    };
    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        return Err(DomainError::validation(format!("route must be an absolute path, got '{path}'")));
    }
    Ok(Some(path))
}

impl BusinessObject for MenuItem {
    type Draft = MenuItemDraft;
    type Patch = MenuItemPatch;

    const ENTITY_TYPE: &'static str = "platform.menu_item";
    const FIELDS: &'static [&'static str] = &["name", "code", "route", "icon", "sequence", "module_code", "parent_id"];
    const DEFAULT_ORDER: &'static [&'static str] = &["sequence", "name"];
    const CODE_FIELD: Option<&'static str> = Some("code");
    const PARENT_FIELD: Option<&'static str> = Some("parent_id");

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: MenuItemDraft) -> DomainResult<Self> {
        Ok(Self {
            record: Record::pending(),
            name: require_text("name", &draft.name, 120)?,
            code: normalize_optional_code(draft.code.as_deref())?,
            route: route(draft.route.as_deref())?,
            icon: optional_text("icon", draft.icon.as_deref(), 60)?,
            sequence: ensure_range("sequence", draft.sequence, 0, 10_000)?,
            module_code: normalize_optional_code(draft.module_code.as_deref())?,
            parent_id: draft.parent_id,
        })
    }

    fn merge(&self, patch: &MenuItemPatch) -> DomainResult<Self> {
        let mut merged = Self::build(MenuItemDraft {
            name: pick(&self.name, &patch.name),
            code: pick_nullable(&self.code, &patch.code),
            route: pick_nullable(&self.route, &patch.route),
            icon: pick_nullable(&self.icon, &patch.icon),
            sequence: pick(&self.sequence, &patch.sequence),
            module_code: pick_nullable(&self.module_code, &patch.module_code),
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
