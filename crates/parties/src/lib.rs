//! Parties domain module (partners and their contacts).
//!
//! Plain business objects: validation and normalization only. Persistence,
//! tenant scoping and events come from `bof-infra::Repository`.

pub mod contact;
pub mod partner;

pub use contact::{ContactDraft, ContactPatch, PartnerContact};
pub use partner::{Partner, PartnerDraft, PartnerPatch, PartnerType};
