//! Helpers for partial-update ("patch") inputs.
//!
//! Nullable attributes are patched with `Option<Option<T>>`:
//! - `None`: field absent, keep the current value
//! - `Some(None)`: explicitly cleared
//! - `Some(Some(v))`: set to `v`

use serde::{Deserialize, Deserializer};

/// Deserialize a present field (including an explicit `null`) as `Some(..)`.
///
/// Pair with `#[serde(default)]` so a missing field stays `None`:
///
/// ```ignore
/// #[serde(default, deserialize_with = "bof_core::patch::double_option")]
/// pub parent_id: Option<Option<EntityId>>,
/// ```
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Resolve a required field against a patch value.
pub fn pick<T: Clone>(current: &T, patch: &Option<T>) -> T {
    patch.as_ref().unwrap_or(current).clone()
}

/// Resolve a nullable field against a double-option patch value.
pub fn pick_nullable<T: Clone>(current: &Option<T>, patch: &Option<Option<T>>) -> Option<T> {
    match patch {
        Some(value) => value.clone(),
        None => current.clone(),
    }
}
