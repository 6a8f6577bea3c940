//! Inventory domain module (item catalogue and category tree).
//!
//! Plain business objects: validation and normalization only.

pub mod category;
pub mod item;

pub use category::{Category, CategoryDraft, CategoryPatch};
pub use item::{Item, ItemDraft, ItemPatch};
