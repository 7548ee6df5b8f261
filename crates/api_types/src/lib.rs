use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Cad,
}

pub mod entry {
    use super::*;

    /// Request body for a manual entry.
    ///
    /// `date` accepts `YYYY-MM-DD`, `DD/MM/YYYY`, `MM/DD/YYYY` and
    /// `DD-MM-YYYY`. Retrying with the same `idempotency_key` returns the
    /// entry created by the first attempt.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryNew {
        pub amount_minor: i64,
        pub currency: Option<Currency>,
        pub category: String,
        pub description: String,
        pub date: String,
        pub tags: Option<Vec<String>>,
        pub notes: Option<String>,
        pub idempotency_key: Option<String>,
    }

    /// Request body for an entry edit. Absent fields are left unchanged; an
    /// empty `notes` clears them.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EntryUpdate {
        pub amount_minor: Option<i64>,
        pub currency: Option<Currency>,
        pub category: Option<String>,
        pub description: Option<String>,
        pub date: Option<String>,
        pub tags: Option<Vec<String>>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryView {
        pub id: Uuid,
        pub amount_minor: i64,
        pub currency: Currency,
        pub category: String,
        pub description: String,
        pub date: NaiveDate,
        pub tags: Vec<String>,
        pub notes: Option<String>,
        pub idempotency_key: Option<String>,
        /// Recurring rule that generated the entry, if any.
        pub rule_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
    }

    /// Response of a create. `created` is false when the idempotency key was
    /// already used and `entry` is the stored one.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryCreated {
        pub entry: EntryView,
        pub created: bool,
    }

    /// Query string for listing entries.
    ///
    /// `from` and `to` are inclusive.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EntryList {
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub category: Option<String>,
        pub search: Option<String>,
        pub tag: Option<String>,
        pub min_amount_minor: Option<i64>,
        pub max_amount_minor: Option<i64>,
        pub limit: Option<u64>,
        /// Opaque pagination cursor from a previous response.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EntryListResponse {
        pub entries: Vec<EntryView>,
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<String>,
    }
}

pub mod recurring {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Frequency {
        Daily,
        Weekly,
        Monthly,
        Yearly,
    }

    impl Frequency {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Daily => "daily",
                Self::Weekly => "weekly",
                Self::Monthly => "monthly",
                Self::Yearly => "yearly",
            }
        }
    }

    /// Request body for a new recurring rule.
    ///
    /// - `day_of_week` (0 = Monday .. 6 = Sunday) only for `weekly`;
    /// - `day_of_month` (1..=31) for `monthly` and `yearly`;
    /// - `month_of_year` (1..=12) only for `yearly`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleNew {
        pub amount_minor: i64,
        pub currency: Option<Currency>,
        pub category: String,
        pub description: String,
        pub frequency: Frequency,
        pub day_of_week: Option<i32>,
        pub day_of_month: Option<i32>,
        pub month_of_year: Option<i32>,
        pub start_date: NaiveDate,
        pub end_date: Option<NaiveDate>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleView {
        pub id: Uuid,
        pub amount_minor: i64,
        pub currency: Currency,
        pub category: String,
        pub description: String,
        pub frequency: Frequency,
        pub day_of_week: Option<i32>,
        pub day_of_month: Option<i32>,
        pub month_of_year: Option<i32>,
        /// e.g. `Monthly on day 31`.
        pub label: String,
        pub start_date: NaiveDate,
        pub end_date: Option<NaiveDate>,
        pub last_processed: Option<NaiveDate>,
        pub next_due_date: Option<NaiveDate>,
        pub active: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleListResponse {
        pub rules: Vec<RuleView>,
    }

    /// Request body for a scheduler run. `as_of` defaults to today (UTC).
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ProcessDue {
        pub as_of: Option<NaiveDate>,
    }

    /// A rule the run could not process.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleFailureView {
        pub rule_id: Uuid,
        pub message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProcessDueResponse {
        pub processed_count: usize,
        pub skipped: usize,
        pub entries: Vec<super::entry::EntryView>,
        #[serde(default)]
        pub errors: Vec<RuleFailureView>,
    }
}

pub mod budget {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetNew {
        pub category: String,
        pub monthly_limit_minor: i64,
        /// Percentage of the limit (0..=100) that raises a warning. Defaults to 80.
        pub alert_threshold: Option<u8>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BudgetUpdate {
        pub monthly_limit_minor: Option<i64>,
        pub alert_threshold: Option<u8>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetView {
        pub id: Uuid,
        pub category: String,
        pub monthly_limit_minor: i64,
        pub alert_threshold: u8,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetListResponse {
        pub budgets: Vec<BudgetView>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AlertSeverity {
        Warning,
        Danger,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetStatusView {
        pub budget: BudgetView,
        /// `YYYY-MM`.
        pub month: String,
        pub spent_minor: i64,
        /// Negative once the limit is exceeded.
        pub remaining_minor: i64,
        pub percentage_used: i64,
        pub is_over_budget: bool,
        pub is_alert: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetAlertView {
        pub budget_id: Uuid,
        pub category: String,
        pub monthly_limit_minor: i64,
        pub spent_minor: i64,
        pub percentage_used: i64,
        pub severity: AlertSeverity,
        pub message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetOverviewView {
        pub month: String,
        pub budgets: Vec<BudgetStatusView>,
        pub alerts: Vec<BudgetAlertView>,
        pub total_budgeted_minor: i64,
        pub total_spent_minor: i64,
        pub categories_over_budget: usize,
    }

    /// Query string selecting a month (`YYYY-MM`); defaults to the current one.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct MonthQuery {
        pub month: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetCheck {
        pub category: String,
        pub amount_minor: i64,
        pub month: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetCheckResponse {
        pub alert: Option<BudgetAlertView>,
    }
}

pub mod import {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportRowErrorView {
        pub line: usize,
        pub message: String,
        pub fields: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportRowView {
        pub line: usize,
        pub date: NaiveDate,
        pub category: String,
        pub description: String,
        pub amount_minor: i64,
        pub currency: Currency,
        pub tags: Vec<String>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportPreviewView {
        pub total_rows: usize,
        pub valid_rows: usize,
        pub invalid_rows: usize,
        pub errors: Vec<ImportRowErrorView>,
        pub sample_valid_entries: Vec<ImportRowView>,
        pub estimated_total_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportResultView {
        pub success_count: usize,
        pub error_count: usize,
        pub duplicate_count: usize,
        pub total_rows: usize,
        pub errors: Vec<ImportRowErrorView>,
        pub entry_ids: Vec<Uuid>,
    }
}
