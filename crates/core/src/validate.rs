//! Attribute validation predicates shared by entity types.

use crate::error::{DomainError, DomainResult};

/// Maximum length of a normalized business code.
pub const MAX_CODE_LEN: usize = 50;

/// Trim + uppercase a business code, rejecting codes that normalize to empty.
pub fn normalize_code(raw: &str) -> DomainResult<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(DomainError::validation("code cannot be empty"));
    }
    if code.chars().count() > MAX_CODE_LEN {
        return Err(DomainError::validation(format!(
            "code cannot exceed {MAX_CODE_LEN} characters"
        )));
    }
    Ok(code)
}

/// Normalize an optional code; an explicitly provided blank code is an error.
pub fn normalize_optional_code(raw: Option<&str>) -> DomainResult<Option<String>> {
    raw.map(normalize_code).transpose()
}

/// Required, trimmed, non-empty text bounded to `max` characters.
pub fn require_text(field: &str, raw: &str, max: usize) -> DomainResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Optional trimmed text; blank collapses to `None`.
pub fn optional_text(field: &str, raw: Option<&str>, max: usize) -> DomainResult<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => require_text(field, value, max).map(Some),
    }
}

/// Optional e-mail address with a minimal shape check (`local@domain.tld`).
pub fn optional_email(field: &str, raw: Option<&str>) -> DomainResult<Option<String>> {
    let Some(value) = optional_text(field, raw, 254)? else {
        return Ok(None);
    };
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || value.contains(char::is_whitespace) {
        return Err(DomainError::validation(format!("{field} is not a valid e-mail address")));
    }
    Ok(Some(value.to_lowercase()))
}

/// Inclusive integer range check.
pub fn ensure_range(field: &str, value: i64, min: i64, max: i64) -> DomainResult<i64> {
    if value < min || value > max {
        return Err(DomainError::validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(value)
}

/// Case-insensitive membership in a fixed set; returns the canonical member.
pub fn ensure_one_of<'a>(field: &str, raw: &str, allowed: &[&'a str]) -> DomainResult<&'a str> {
    let needle = raw.trim().to_lowercase();
    allowed
        .iter()
        .copied()
        .find(|candidate| *candidate == needle)
        .ok_or_else(|| {
            DomainError::validation(format!(
                "{field} must be one of: {}",
                allowed.join(", ")
            ))
        })
}
