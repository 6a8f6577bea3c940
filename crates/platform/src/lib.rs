//! Platform registry: companies (the tenants themselves), installable
//! modules and per-tenant navigation menus.

pub mod company;
pub mod menu;
pub mod module;

pub use company::{Company, CompanyDraft, CompanyPatch};
pub use menu::{MenuItem, MenuItemDraft, MenuItemPatch};
pub use module::{Module, ModuleDraft, ModulePatch};
