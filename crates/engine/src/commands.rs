//! Command structs for engine operations.
//!
//! These types group parameters for write operations (entries, rules,
//! budgets), keeping call sites readable and avoiding long argument lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Currency, DedupeKey, Frequency, Money};

/// Data of a ledger entry to create.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    pub description: String,
    pub occurred_on: NaiveDate,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

impl NewEntry {
    #[must_use]
    pub fn new(
        amount: Money,
        category: impl Into<String>,
        description: impl Into<String>,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            amount,
            currency: Currency::default(),
            category: category.into(),
            description: description.into(),
            occurred_on,
            tags: Vec::new(),
            notes: None,
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A manual entry plus its optional idempotency key.
#[derive(Clone, Debug)]
pub struct CreateEntryCmd {
    pub owner_id: String,
    pub entry: NewEntry,
    pub dedupe: Option<DedupeKey>,
}

impl CreateEntryCmd {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, entry: NewEntry) -> Self {
        Self {
            owner_id: owner_id.into(),
            entry,
            dedupe: None,
        }
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe = Some(DedupeKey::idempotency(key));
        self
    }

    #[must_use]
    pub fn dedupe(mut self, key: DedupeKey) -> Self {
        self.dedupe = Some(key);
        self
    }
}

/// Patch for a user-initiated entry edit. `None` leaves the field untouched;
/// `notes: Some(None)` clears the notes.
#[derive(Clone, Debug, Default)]
pub struct EntryUpdate {
    pub amount: Option<Money>,
    pub currency: Option<Currency>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub occurred_on: Option<NaiveDate>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<Option<String>>,
}

/// Create a recurrence rule.
#[derive(Clone, Debug)]
pub struct NewRule {
    pub owner_id: String,
    pub amount: Money,
    pub currency: Currency,
    pub category: String,
    pub description: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl NewRule {
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        amount: Money,
        category: impl Into<String>,
        description: impl Into<String>,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            amount,
            currency: Currency::default(),
            category: category.into(),
            description: description.into(),
            frequency,
            start_date,
            end_date: None,
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

/// Create (or replace the limits of) the budget of a category.
#[derive(Clone, Debug)]
pub struct BudgetInput {
    pub category: String,
    pub monthly_limit: Money,
    pub alert_threshold: Option<u8>,
}

impl BudgetInput {
    #[must_use]
    pub fn new(category: impl Into<String>, monthly_limit: Money) -> Self {
        Self {
            category: category.into(),
            monthly_limit,
            alert_threshold: None,
        }
    }

    #[must_use]
    pub fn alert_threshold(mut self, threshold: u8) -> Self {
        self.alert_threshold = Some(threshold);
        self
    }
}

/// Patch for an existing budget.
#[derive(Clone, Debug, Default)]
pub struct BudgetUpdate {
    pub monthly_limit: Option<Money>,
    pub alert_threshold: Option<u8>,
}
