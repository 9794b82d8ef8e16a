//! Field-level validation rules shared by every request DTO.
//!
//! Each helper records a problem into a [`ValidationErrors`] accumulator
//! instead of returning early, so a single response can name every offending
//! field.

use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::ValidationErrors;
use crate::types::UnknownVariant;

/// Turn a loosely-typed request fragment into its checked form.
pub trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output, ValidationErrors>;
}

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Reject NUL and control characters other than common whitespace.
pub fn check_chars(value: &str) -> Result<(), &'static str> {
    if value.contains('\0') {
        return Err("contains null bytes");
    }
    if value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    {
        return Err("contains invalid control characters");
    }
    Ok(())
}

fn check_text(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) -> bool {
    if let Err(reason) = check_chars(value) {
        errors.add(field, reason);
        return false;
    }
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {max} characters"));
        return false;
    }
    true
}

/// A mandatory, trimmed, non-empty string.
pub fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let Some(raw) = value else {
        errors.add(field, "Required");
        return None;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        errors.add(field, "must not be empty");
        return None;
    }
    check_text(errors, field, trimmed, max).then(|| trimmed.to_string())
}

/// Like [`required_text`] but for PATCH bodies where absence means "keep".
pub fn changed_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    value.and_then(|v| required_text(errors, field, Some(v), max))
}

/// Optional free text. Blank input collapses to `None`.
pub fn optional_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    check_text(errors, field, trimmed, max).then(|| trimmed.to_string())
}

/// Free text that may legitimately be empty (note bodies). Not trimmed.
pub fn body_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: String,
    max: usize,
) -> Option<String> {
    check_text(errors, field, &value, max).then_some(value)
}

/// PATCH counterpart of [`optional_text`]: `Some(None)` clears the field.
pub fn nullable_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<Option<String>>,
    max: usize,
) -> Option<Option<String>> {
    match value? {
        None => Some(None),
        Some(raw) => {
            let before = errors.0.len();
            let parsed = optional_text(errors, field, Some(raw), max);
            (errors.0.len() == before).then_some(parsed)
        }
    }
}

pub fn enum_value<T>(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    match value?.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            errors.add(field, e.to_string());
            None
        }
    }
}

/// Parsed to UTC at microsecond precision, the finest both backends keep.
pub fn timestamp(errors: &mut ValidationErrors, field: &str, value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(dt) => Some(dt.with_timezone(&Utc).trunc_subsecs(6)),
        Err(_) => {
            errors.add(field, "must be an RFC 3339 date-time");
            None
        }
    }
}

pub fn required_timestamp(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
) -> Option<DateTime<Utc>> {
    match value {
        Some(v) => timestamp(errors, field, &v),
        None => {
            errors.add(field, "Required");
            None
        }
    }
}

pub fn nullable_timestamp(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<Option<String>>,
) -> Option<Option<DateTime<Utc>>> {
    match value? {
        None => Some(None),
        Some(v) => timestamp(errors, field, &v).map(Some),
    }
}

/// Opaque reference to another record. Only shape is checked here; existence
/// and ownership are the controller's job.
pub fn reference(errors: &mut ValidationErrors, field: &str, value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > 64 || check_chars(trimmed).is_err() {
        errors.add(field, "must be a valid identifier");
        return None;
    }
    Some(trimmed.to_string())
}

/// `#RGB` or `#RRGGBB`, normalised to upper case.
pub fn hex_color(errors: &mut ValidationErrors, field: &str, value: &str) -> Option<String> {
    let v = value.trim();
    let valid = v
        .strip_prefix('#')
        .filter(|digits| matches!(digits.len(), 3 | 6))
        .is_some_and(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Some(v.to_ascii_uppercase())
    } else {
        errors.add(field, "must be a hex color like #1A2B3C");
        None
    }
}

/// Shape check only: `local@domain.tld`. Returned lower-cased.
pub fn email(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<String> {
    let Some(raw) = value else {
        errors.add(field, "Required");
        return None;
    };
    let v = raw.trim().to_ascii_lowercase();
    let shaped = match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
                && !v.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !shaped || v.len() > crate::constants::MAX_EMAIL_LEN {
        errors.add(field, "must be a valid email address");
        return None;
    }
    Some(v)
}
