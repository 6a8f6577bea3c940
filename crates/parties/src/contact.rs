use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{optional_email, optional_text, require_text};
use bof_core::{BusinessObject, DomainError, DomainResult, EntityId, Filters, Record};

/// A person reachable at a partner.
///
/// Contacts follow the same soft-delete contract as every other entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerContact {
    #[serde(flatten)]
    pub record: Record,
    pub partner_id: EntityId,
    pub name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub partner_id: EntityId,
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub position: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub is_primary: Option<bool>,
}

impl PartnerContact {
    /// Filter selecting the contacts of one partner.
    pub fn of_partner(partner_id: EntityId) -> Filters {
        Filters::new().eq("partner_id", partner_id.get())
    }
}

impl BusinessObject for PartnerContact {
    type Draft = ContactDraft;
    type Patch = ContactPatch;

    const ENTITY_TYPE: &'static str = "parties.partner_contact";
    const FIELDS: &'static [&'static str] = &["partner_id", "name", "position", "email", "phone", "is_primary"];

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: ContactDraft) -> DomainResult<Self> {
        if !draft.partner_id.is_assigned() {
            return Err(DomainError::validation("partner_id is required"));
        }
        Ok(Self {
            record: Record::pending(),
            partner_id: draft.partner_id,
            name: require_text("name", &draft.name, 200)?,
            position: optional_text("position", draft.position.as_deref(), 100)?,
            email: optional_email("email", draft.email.as_deref())?,
            phone: optional_text("phone", draft.phone.as_deref(), 50)?,
            is_primary: draft.is_primary,
        })
    }

    fn merge(&self, patch: &ContactPatch) -> DomainResult<Self> {
        let mut merged = Self::build(ContactDraft {
            partner_id: self.partner_id,
            name: pick(&self.name, &patch.name),
            position: pick_nullable(&self.position, &patch.position),
            email: pick_nullable(&self.email, &patch.email),
            phone: pick_nullable(&self.phone, &patch.phone),
            is_primary: pick(&self.is_primary, &patch.is_primary),
        })?;
        merged.record = self.record.clone();
        Ok(merged)
    }

    fn references(&self) -> Vec<(&'static str, EntityId)> {
        vec![("partner_id", self.partner_id)]
    }
}
