//! Ledger entries.
//!
//! A `LedgerEntry` is a single expense owned by a user. Entries written by
//! retry-prone sources (client retries, the recurring scheduler, file imports)
//! carry a [`DedupeKey`]; storage enforces at most one entry per
//! `(owner_id, dedupe_kind, dedupe_value)`.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, Money, ResultEngine};

pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

/// Identity of a logical write, unique per owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DedupeKey {
    /// Caller-supplied key for manual entries.
    Idempotency { key: String },
    /// One entry per rule and due date.
    Recurrence { rule_id: Uuid, due_date: NaiveDate },
    /// Content hash of an imported row.
    Import { hash: String },
}

impl DedupeKey {
    pub fn idempotency(key: impl Into<String>) -> Self {
        Self::Idempotency { key: key.into() }
    }

    pub fn recurrence(rule_id: Uuid, due_date: NaiveDate) -> Self {
        Self::Recurrence { rule_id, due_date }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Idempotency { .. } => "idempotency",
            Self::Recurrence { .. } => "recurrence",
            Self::Import { .. } => "import",
        }
    }

    pub fn value(&self) -> String {
        match self {
            Self::Idempotency { key } => key.clone(),
            Self::Recurrence { rule_id, due_date } => format!("{rule_id}:{due_date}"),
            Self::Import { hash } => hash.clone(),
        }
    }

    /// Trims and validates the key before it reaches storage.
    pub(crate) fn normalize(self) -> ResultEngine<Self> {
        match self {
            Self::Idempotency { key } => {
                let trimmed = key.trim();
                if trimmed.is_empty() {
                    return Err(EngineError::Validation(
                        "idempotency key must not be empty".to_string(),
                    ));
                }
                if trimmed.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
                    return Err(EngineError::Validation(format!(
                        "idempotency key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
                    )));
                }
                Ok(Self::idempotency(trimmed))
            }
            Self::Import { hash } if hash.is_empty() => Err(EngineError::Validation(
                "import hash must not be empty".to_string(),
            )),
            other => Ok(other),
        }
    }

    fn from_columns(
        kind: Option<&str>,
        value: Option<&str>,
        rule_id: Option<Uuid>,
        due_date: Option<NaiveDate>,
    ) -> Option<Self> {
        match (kind?, value?) {
            ("idempotency", key) => Some(Self::idempotency(key)),
            ("import", hash) => Some(Self::Import {
                hash: hash.to_string(),
            }),
            ("recurrence", _) => Some(Self::recurrence(rule_id?, due_date?)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: String,
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    pub description: String,
    pub occurred_on: NaiveDate,
    pub tags: BTreeSet<String>,
    pub notes: Option<String>,
    pub dedupe: Option<DedupeKey>,
    /// Rule that materialized this entry, if any.
    pub rule_id: Option<Uuid>,
    /// Due date of `rule_id` this entry was materialized for.
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn idempotency_key(&self) -> Option<&str> {
        match &self.dedupe {
            Some(DedupeKey::Idempotency { key }) => Some(key),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub category: String,
    pub description: String,
    pub occurred_on: Date,
    /// JSON array of lowercase tags.
    pub tags: Option<String>,
    pub notes: Option<String>,
    pub dedupe_kind: Option<String>,
    pub dedupe_value: Option<String>,
    pub rule_id: Option<Uuid>,
    pub due_date: Option<Date>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn encode_tags(tags: &BTreeSet<String>) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        serde_json::to_string(tags).ok()
    }
}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        let (rule_id, due_date) = match &entry.dedupe {
            Some(DedupeKey::Recurrence { rule_id, due_date }) => (Some(*rule_id), Some(*due_date)),
            _ => (entry.rule_id, entry.due_date),
        };
        Self {
            id: ActiveValue::Set(entry.id),
            owner_id: ActiveValue::Set(entry.owner_id.clone()),
            amount_minor: ActiveValue::Set(entry.amount.minor()),
            currency: ActiveValue::Set(entry.currency.code().to_string()),
            category: ActiveValue::Set(entry.category.clone()),
            description: ActiveValue::Set(entry.description.clone()),
            occurred_on: ActiveValue::Set(entry.occurred_on),
            tags: ActiveValue::Set(encode_tags(&entry.tags)),
            notes: ActiveValue::Set(entry.notes.clone()),
            dedupe_kind: ActiveValue::Set(entry.dedupe.as_ref().map(|d| d.kind().to_string())),
            dedupe_value: ActiveValue::Set(entry.dedupe.as_ref().map(DedupeKey::value)),
            rule_id: ActiveValue::Set(rule_id),
            due_date: ActiveValue::Set(due_date),
            created_at: ActiveValue::Set(entry.created_at),
            updated_at: ActiveValue::Set(entry.updated_at),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let tags = model
            .tags
            .as_deref()
            .and_then(|raw| serde_json::from_str::<BTreeSet<String>>(raw).ok())
            .unwrap_or_default();
        let dedupe = DedupeKey::from_columns(
            model.dedupe_kind.as_deref(),
            model.dedupe_value.as_deref(),
            model.rule_id,
            model.due_date,
        );
        Ok(Self {
            id: model.id,
            owner_id: model.owner_id,
            amount: Money::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            category: model.category,
            description: model.description,
            occurred_on: model.occurred_on,
            tags,
            notes: model.notes,
            dedupe,
            rule_id: model.rule_id,
            due_date: model.due_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurrence_key_value_is_stable() {
        let rule_id = Uuid::nil();
        let due = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let key = DedupeKey::recurrence(rule_id, due);
        assert_eq!(key.kind(), "recurrence");
        assert_eq!(
            key.value(),
            "00000000-0000-0000-0000-000000000000:2024-02-29"
        );
        assert_eq!(
            DedupeKey::from_columns(Some("recurrence"), Some("x"), Some(rule_id), Some(due)),
            Some(key)
        );
    }

    #[test]
    fn idempotency_key_length_is_bounded() {
        assert!(DedupeKey::idempotency("a".repeat(64)).normalize().is_ok());
        assert!(DedupeKey::idempotency("a".repeat(65)).normalize().is_err());
        assert!(DedupeKey::idempotency("  ").normalize().is_err());
        assert_eq!(
            DedupeKey::idempotency(" k1 ").normalize().unwrap(),
            DedupeKey::idempotency("k1")
        );
    }
}
