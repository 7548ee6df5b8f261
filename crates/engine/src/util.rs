//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::{EngineError, Money, NewEntry, ResultEngine};

pub(crate) const MAX_CATEGORY_LEN: usize = 100;
pub(crate) const MAX_DESCRIPTION_LEN: usize = 500;
pub(crate) const MAX_NOTES_LEN: usize = 2000;
pub(crate) const MAX_TAGS: usize = 10;

/// Date formats accepted from user input, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

/// Parses a user-supplied date, trying every accepted format.
pub fn parse_entry_date(raw: &str) -> ResultEngine<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| EngineError::Validation(format!("invalid date format: {trimmed}")))
}

/// Trim `value` and reject empty or oversized text.
pub(crate) fn normalize_required_text(value: &str, label: &str, max: usize) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    if trimmed.chars().count() > max {
        return Err(EngineError::Validation(format!(
            "{label} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(
    value: Option<&str>,
    label: &str,
    max: usize,
) -> ResultEngine<Option<String>> {
    let Some(trimmed) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > max {
        return Err(EngineError::Validation(format!(
            "{label} must be at most {max} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Lowercase, trim and dedupe tags; empty tags are dropped.
pub(crate) fn normalize_tags<I, S>(tags: I) -> ResultEngine<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if set.len() > MAX_TAGS {
        return Err(EngineError::Validation(format!(
            "at most {MAX_TAGS} tags are allowed"
        )));
    }
    Ok(set)
}

pub(crate) fn ensure_positive_amount(amount: Money) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::Validation("amount must be > 0".to_string()));
    }
    Ok(())
}

/// Entry data after validation, ready to be stored.
#[derive(Clone, Debug)]
pub(crate) struct ValidEntry {
    pub(crate) entry: NewEntry,
    pub(crate) tags: BTreeSet<String>,
}

pub(crate) fn validate_new_entry(entry: NewEntry) -> ResultEngine<ValidEntry> {
    ensure_positive_amount(entry.amount)?;
    let category = normalize_required_text(&entry.category, "category", MAX_CATEGORY_LEN)?;
    let description =
        normalize_required_text(&entry.description, "description", MAX_DESCRIPTION_LEN)?;
    let notes = normalize_optional_text(entry.notes.as_deref(), "notes", MAX_NOTES_LEN)?;
    let tags = normalize_tags(&entry.tags)?;
    Ok(ValidEntry {
        entry: NewEntry {
            category,
            description,
            notes,
            ..entry
        },
        tags,
    })
}
