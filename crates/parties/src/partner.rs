use serde::{Deserialize, Serialize};

use bof_core::patch::{double_option, pick, pick_nullable};
use bof_core::validate::{ensure_one_of, normalize_optional_code, optional_email, optional_text, require_text};
use bof_core::{BusinessObject, DomainError, DomainResult, EntityId, FilterExpression, Filters, Record};

const MAX_NAME_LEN: usize = 200;
const MAX_PHONE_LEN: usize = 50;

/// Commercial role of a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerType {
    Customer,
    Supplier,
    Vendor,
    Both,
}

impl PartnerType {
    pub const NAMES: &'static [&'static str] = &["customer", "supplier", "vendor", "both"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Supplier => "supplier",
            Self::Vendor => "vendor",
            Self::Both => "both",
        }
    }

    /// Parse a caller-supplied type name (case-insensitive).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        match ensure_one_of("partner_type", raw, Self::NAMES)? {
            "customer" => Ok(Self::Customer),
            "supplier" => Ok(Self::Supplier),
            "vendor" => Ok(Self::Vendor),
            "both" => Ok(Self::Both),
            other => Err(DomainError::validation(format!("unsupported partner_type '{other}'"))),
        }
    }

    pub fn sells_to_us(&self) -> bool {
        matches!(self, Self::Supplier | Self::Vendor | Self::Both)
    }

    pub fn buys_from_us(&self) -> bool {
        matches!(self, Self::Customer | Self::Both)
    }
}

impl core::fmt::Display for PartnerType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer, supplier or vendor. Partners may be grouped under a parent
/// partner (e.g. branches of one company).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    #[serde(flatten)]
    pub record: Record,
    pub name: String,
    pub code: Option<String>,
    pub partner_type: PartnerType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub parent_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerDraft {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "default_partner_type")]
    pub partner_type: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
}

fn default_partner_type() -> String {
    PartnerType::Customer.as_str().to_string()
}

impl PartnerDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            partner_type: default_partner_type(),
            email: None,
            phone: None,
            parent_id: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_type(mut self, partner_type: impl Into<String>) -> Self {
        self.partner_type = partner_type.into();
        self
    }

    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub code: Option<Option<String>>,
    #[serde(default)]
    pub partner_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<EntityId>>,
}

impl Partner {
    /// Filter for partners we sell to (`customer` or `both`).
    pub fn customers() -> Filters {
        Filters::new().matching(FilterExpression::or(vec![
            FilterExpression::equals("partner_type", PartnerType::Customer.as_str()),
            FilterExpression::equals("partner_type", PartnerType::Both.as_str()),
        ]))
    }

    /// Filter for partners we buy from (`supplier`, `vendor` or `both`).
    pub fn suppliers() -> Filters {
        Filters::new().matching(FilterExpression::or(vec![
            FilterExpression::equals("partner_type", PartnerType::Supplier.as_str()),
            FilterExpression::equals("partner_type", PartnerType::Vendor.as_str()),
            FilterExpression::equals("partner_type", PartnerType::Both.as_str()),
        ]))
    }

    fn draft(&self) -> PartnerDraft {
        PartnerDraft {
            name: self.name.clone(),
            code: self.code.clone(),
            partner_type: self.partner_type.as_str().to_string(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            parent_id: self.parent_id,
        }
    }
}

impl BusinessObject for Partner {
    type Draft = PartnerDraft;
    type Patch = PartnerPatch;

    const ENTITY_TYPE: &'static str = "parties.partner";
    const FIELDS: &'static [&'static str] = &["name", "code", "partner_type", "email", "phone", "parent_id"];
    const CODE_FIELD: Option<&'static str> = Some("code");
    const PARENT_FIELD: Option<&'static str> = Some("parent_id");

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn build(draft: PartnerDraft) -> DomainResult<Self> {
        Ok(Self {
            record: Record::pending(),
            name: require_text("name", &draft.name, MAX_NAME_LEN)?,
            code: normalize_optional_code(draft.code.as_deref())?,
            partner_type: PartnerType::parse(&draft.partner_type)?,
            email: optional_email("email", draft.email.as_deref())?,
            phone: optional_text("phone", draft.phone.as_deref(), MAX_PHONE_LEN)?,
            parent_id: draft.parent_id,
        })
    }

    fn merge(&self, patch: &PartnerPatch) -> DomainResult<Self> {
        let current = self.draft();
        let mut merged = Self::build(PartnerDraft {
            name: pick(&current.name, &patch.name),
            code: pick_nullable(&current.code, &patch.code),
            partner_type: pick(&current.partner_type, &patch.partner_type),
            email: pick_nullable(&current.email, &patch.email),
            phone: pick_nullable(&current.phone, &patch.phone),
            parent_id: pick_nullable(&current.parent_id, &patch.parent_id),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_normalizes_code_and_type() {
        let partner = Partner::build(
            PartnerDraft::new("  ACME Corp ")
                .with_code("acme001")
                .with_type("Supplier"),
        )
        .unwrap();

        assert_eq!(partner.name, "ACME Corp");
        assert_eq!(partner.code.as_deref(), Some("ACME001"));
        assert_eq!(partner.partner_type, PartnerType::Supplier);
        assert!(partner.is_active());
    }

    #[test]
    fn build_rejects_invalid_input() {
        for draft in [
            PartnerDraft::new(""),
            PartnerDraft::new("x").with_code("   "),
            PartnerDraft::new("x").with_type("reseller"),
            PartnerDraft {
                email: Some("not-an-email".to_string()),
                ..PartnerDraft::new("x")
            },
        ] {
            assert!(
                matches!(Partner::build(draft.clone()), Err(DomainError::Validation(_))),
                "{draft:?} should be rejected"
            );
        }
    }

    #[test]
    fn merge_applies_only_present_fields() {
        let partner = Partner::build(PartnerDraft {
            email: Some("Sales@Acme.com".to_string()),
            ..PartnerDraft::new("ACME").with_code("a1")
        })
        .unwrap();

        let patch: PartnerPatch = serde_json::from_value(json!({
            "name": "ACME Holdings",
            "email": null
        }))
        .unwrap();
        let merged = partner.merge(&patch).unwrap();

        assert_eq!(merged.name, "ACME Holdings");
        assert_eq!(merged.email, None);
        assert_eq!(merged.code.as_deref(), Some("A1"));
        assert_eq!(merged.partner_type, PartnerType::Customer);
        assert_eq!(merged.record, partner.record);
    }

    #[test]
    fn merge_revalidates() {
        let partner = Partner::build(PartnerDraft::new("ACME")).unwrap();
        let patch = PartnerPatch {
            name: Some("  ".to_string()),
            ..PartnerPatch::default()
        };
        assert!(matches!(partner.merge(&patch), Err(DomainError::Validation(_))));
    }

    #[test]
    fn serializes_flat_with_record_fields() {
        let partner = Partner::build(PartnerDraft::new("ACME").with_type("both")).unwrap();
        let value = serde_json::to_value(&partner).unwrap();

        assert_eq!(value["partner_type"], json!("both"));
        assert_eq!(value["is_active"], json!(true));
        assert!(value.get("record").is_none());
    }

    #[test]
    fn role_filters_match_expected_types() {
        let row = |t: &str| {
            serde_json::to_value(Partner::build(PartnerDraft::new("p").with_type(t)).unwrap())
                .unwrap()
                .as_object()
                .cloned()
                .unwrap()
        };
        let customers = &Partner::customers().expressions[0];
        let suppliers = &Partner::suppliers().expressions[0];

        assert!(customers.matches(&row("both")));
        assert!(!customers.matches(&row("vendor")));
        assert!(suppliers.matches(&row("vendor")));
        assert!(!suppliers.matches(&row("customer")));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

            #[test]
            fn stored_codes_are_trimmed_uppercase(code in "[ ]{0,3}[a-zA-Z0-9]{1,20}[ ]{0,3}") {
                let partner = Partner::build(PartnerDraft::new("p").with_code(code.clone())).unwrap();
                let stored = partner.code.unwrap();
                prop_assert_eq!(stored.clone(), code.trim().to_uppercase());
                prop_assert!(!stored.starts_with(' ') && !stored.ends_with(' '));
            }
        }
    }
}
