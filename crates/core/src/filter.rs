//! Filter expressions and caller-facing filter input.
//!
//! `FilterExpression` is the structured predicate handed to stores. Stores
//! either evaluate it in memory ([`FilterExpression::matches`]) or render it
//! to SQL; both must agree on these semantics:
//!
//! - `Equals`: by-value JSON equality, numbers compared numerically
//!   (`5` equals `5.0`); a missing field equals `null`
//! - `Contains`: case-insensitive substring over the field's text form
//!   (strings as-is, numbers/booleans rendered); `null` never matches
//! - `And([])` is true, `Or([])` is false

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured predicate over entity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpression {
    Equals { field: String, value: Value },
    Contains { field: String, term: String },
    And { all: Vec<FilterExpression> },
    Or { any: Vec<FilterExpression> },
}

impl FilterExpression {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            term: term.into(),
        }
    }

    pub fn and(all: Vec<FilterExpression>) -> Self {
        Self::And { all }
    }

    pub fn or(any: Vec<FilterExpression>) -> Self {
        Self::Or { any }
    }

    /// Every field name referenced by this expression (depth-first).
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals { field, .. } | Self::Contains { field, .. } => out.push(field),
            Self::And { all: children } | Self::Or { any: children } => {
                for child in children {
                    child.collect_fields(out);
                }
            }
        }
    }

    /// Evaluate against a JSON object (an entity snapshot).
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        match self {
            Self::Equals { field, value } => values_equal(row.get(field).unwrap_or(&Value::Null), value),
            Self::Contains { field, term } => {
                let needle = term.to_lowercase();
                row.get(field)
                    .and_then(search_text)
                    .is_some_and(|haystack| haystack.to_lowercase().contains(&needle))
            }
            Self::And { all } => all.iter().all(|e| e.matches(row)),
            Self::Or { any } => any.iter().any(|e| e.matches(row)),
        }
    }
}

/// JSON equality with numbers compared by value, matching `jsonb` equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Text form of a scalar used by `Contains`; `None` for null/arrays/objects.
pub fn search_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Total order over JSON scalars used for sorting:
/// null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Free-text search over a set of named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    pub term: String,
    pub fields: Vec<String>,
}

/// Caller-facing filter input for list/count operations.
///
/// Equality filters are ANDed, the optional search ORs a substring match
/// across its fields, and any extra expressions are ANDed on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub equals: BTreeMap<String, Value>,
    #[serde(default)]
    pub search: Option<Search>,
    #[serde(default)]
    pub expressions: Vec<FilterExpression>,
    /// Include soft-deleted rows (otherwise only `is_active = true` rows).
    #[serde(default)]
    pub include_inactive: bool,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    pub fn search<I, S>(mut self, term: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = Some(Search {
            term: term.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn matching(mut self, expression: FilterExpression) -> Self {
        self.expressions.push(expression);
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    /// Whether the caller constrains `is_active` explicitly.
    pub fn mentions_active_flag(&self) -> bool {
        self.equals.contains_key("is_active")
            || self
                .expressions
                .iter()
                .any(|e| e.fields().contains(&"is_active"))
    }
}
