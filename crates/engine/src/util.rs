//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::Validation(format!("invalid {label} id")))
}

/// Parse an optional UUID column.
pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|v| parse_uuid(v, label)).transpose()
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::Validation(format!("invalid currency: {value}")))
}

/// Collapse inner whitespace and trim; `None` when nothing is left.
pub(crate) fn normalize_display(input: &str) -> Option<String> {
    let mut out = String::new();
    for token in input.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Natural-key form of a display name: case-folded, accents stripped,
/// punctuation collapsed to single spaces.
///
/// `"Café  Nero!"` and `"cafe nero"` share the key `"cafe nero"`.
pub(crate) fn normalize_key(input: &str) -> Option<String> {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    let normalized = out.trim_end();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// Required name: normalized display and key, or a validation error.
pub(crate) fn required_name(value: &str, label: &str) -> ResultEngine<(String, String)> {
    let invalid = || EngineError::Validation(format!("{label} name must not be empty"));
    let display = normalize_display(value).ok_or_else(invalid)?;
    let key = normalize_key(&display).ok_or_else(invalid)?;
    Ok((display, key))
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value.and_then(normalize_display)
}
