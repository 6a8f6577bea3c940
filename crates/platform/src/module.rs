use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{normalize_code, optional_text, require_text};
use bof_core::{BusinessObject, DomainError, DomainResult, Record, TenantScope};

/// Entry of the global module registry (e.g. `SALES`, `INVENTORY`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(flatten)]
    pub record: Record,
    pub code: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDraft {
    pub code: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// `MAJOR.MINOR[.PATCH]`, numeric components only.
fn version(raw: &str) -> DomainResult<String> {
    let value = raw.trim();
    let parts: Vec<&str> = value.split('.').collect();
    let well_formed = (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return Err(DomainError::validation(format!(
            "version must look like 1.2 or 1.2.3, got '{raw}'"
        )));
    }
    Ok(value.to_string())
}

impl BusinessObject for Module {
    type Draft = ModuleDraft;
    type Patch = ModulePatch;

    const ENTITY_TYPE: &'static str = "platform.module";
    const SCOPE: TenantScope = TenantScope::Global;
    const FIELDS: &'static [&'static str] = &["code", "name", "version", "description"];
    const DEFAULT_ORDER: &'static [&'static str] = &["code"];
    const CODE_FIELD: Option<&'static str> = Some("code");

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: ModuleDraft) -> DomainResult<Self> {
        Ok(Self {
            record: Record::pending(),
            code: normalize_code(&draft.code)?,
            name: require_text("name", &draft.name, 120)?,
            version: version(&draft.version)?,
            description: optional_text("description", draft.description.as_deref(), 1000)?,
        })
    }

    // The code identifies the module across tenants and is not patchable.
    fn merge(&self, patch: &ModulePatch) -> DomainResult<Self> {
        let mut merged = Self::build(ModuleDraft {
            code: self.code.clone(),
            name: pick(&self.name, &patch.name),
            version: pick(&self.version, &patch.version),
            description: pick_nullable(&self.description, &patch.description),
        })?;
        merged.record = self.record.clone();
        Ok(merged)
    }

    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }
}
