//! Change tracking: field-level diffs between two entity snapshots.
//!
//! Pure functions over JSON snapshots; nothing here touches storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field values of one entity at one point in time.
///
/// A missing field and an explicit `null` are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    /// Capture a serializable entity as a flat field map.
    pub fn capture<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "snapshot requires a JSON object, got {other}"
            ))),
        }
    }

    pub fn from_map(fields: BTreeMap<String, Value>) -> Self {
        Self(fields)
    }

    /// Value of `field`, `Null` when absent.
    pub fn get(&self, field: &str) -> &Value {
        self.0.get(field).unwrap_or(&Value::Null)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn to_object(&self) -> Map<String, Value> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Equality treating missing fields and `null` alike.
    pub fn equivalent(&self, other: &Snapshot) -> bool {
        self.0
            .keys()
            .chain(other.0.keys())
            .all(|field| self.get(field) == other.get(field))
    }
}

/// Old/new value pair for one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Changed fields between two snapshots, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of the changes without the listed fields (e.g. `updated_at`).
    pub fn without(&self, ignored: &[&str]) -> ChangeSet {
        ChangeSet(
            self.0
                .iter()
                .filter(|(k, _)| !ignored.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Fields whose values differ between `before` and `after`.
pub fn diff(before: &Snapshot, after: &Snapshot) -> ChangeSet {
    let mut changes = BTreeMap::new();
    for field in before.0.keys().chain(after.0.keys()) {
        if changes.contains_key(field) {
            continue;
        }
        let old = before.get(field);
        let new = after.get(field);
        if old != new {
            changes.insert(
                field.clone(),
                FieldChange {
                    old: old.clone(),
                    new: new.clone(),
                },
            );
        }
    }
    ChangeSet(changes)
}

/// Apply the new values of `changes` onto `before`.
pub fn apply(before: &Snapshot, changes: &ChangeSet) -> Snapshot {
    let mut fields = before.0.clone();
    for (field, change) in &changes.0 {
        fields.insert(field.clone(), change.new.clone());
    }
    Snapshot(fields)
}
