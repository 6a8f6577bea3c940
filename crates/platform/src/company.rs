use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{normalize_code, optional_email, optional_text, require_text};
use bof_core::{BusinessObject, DomainError, DomainResult, Record, TenantId, TenantScope};

pub const DEFAULT_CURRENCY: &str = "USD";

/// A company. Companies are the tenants, so the registry itself is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(flatten)]
    pub record: Record,
    pub code: String,
    pub name: String,
    pub legal_name: Option<String>,
    pub currency: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl CompanyDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            legal_name: None,
            currency: default_currency(),
            email: None,
            phone: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub legal_name: Option<Option<String>>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
}

impl Company {
    /// Tenant id for data owned by this company, once persisted.
    pub fn tenant(&self) -> Option<TenantId> {
        self.record.id.is_assigned().then(|| TenantId::new(self.record.id.get()))
    }
}

/// ISO-4217 style currency code: exactly three ASCII letters.
fn currency_code(raw: &str) -> DomainResult<String> {
    let code = raw.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::validation(format!(
            "currency must be a three-letter code, got '{raw}'"
        )));
    }
    Ok(code)
}

impl BusinessObject for Company {
    type Draft = CompanyDraft;
    type Patch = CompanyPatch;

    const ENTITY_TYPE: &'static str = "platform.company";
    const SCOPE: TenantScope = TenantScope::Global;
    const FIELDS: &'static [&'static str] = &["code", "name", "legal_name", "currency", "email", "phone"];
    const CODE_FIELD: Option<&'static str> = Some("code");

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: CompanyDraft) -> DomainResult<Self> {
        Ok(Self {
            record: Record::pending(),
            code: normalize_code(&draft.code)?,
            name: require_text("name", &draft.name, 200)?,
            legal_name: optional_text("legal_name", draft.legal_name.as_deref(), 300)?,
            currency: currency_code(&draft.currency)?,
            email: optional_email("email", draft.email.as_deref())?,
            phone: optional_text("phone", draft.phone.as_deref(), 50)?,
        })
    }

    fn merge(&self, patch: &CompanyPatch) -> DomainResult<Self> {
        let mut merged = Self::build(CompanyDraft {
            code: pick(&self.code, &patch.code),
            name: pick(&self.name, &patch.name),
            legal_name: pick_nullable(&self.legal_name, &patch.legal_name),
            currency: pick(&self.currency, &patch.currency),
            email: pick_nullable(&self.email, &patch.email),
            phone: pick_nullable(&self.phone, &patch.phone),
        })?;
        merged.record = self.record.clone();
        Ok(merged)
    }

    fn code(&self) -> Option<&str> {
        Some(&self.code)
    }
}
