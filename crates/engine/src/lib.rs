pub use budgets::{
    AlertSeverity, Budget, BudgetAlert, BudgetOverview, BudgetStatus, DEFAULT_ALERT_THRESHOLD,
};
pub use commands::{BudgetInput, BudgetUpdate, CreateEntryCmd, EntryUpdate, NewEntry, NewRule};
pub use currency::Currency;
pub use entries::{DedupeKey, LedgerEntry, MAX_IDEMPOTENCY_KEY_LEN};
pub use error::EngineError;
pub use import::{ImportCandidate, ImportRowError, REQUIRED_COLUMNS, RawRow, parse_csv, parse_row};
pub use money::Money;
pub use month::Month;
pub use ops::{
    Engine, EngineBuilder, EntryFilter, ImportPreview, ImportResult, ProcessedRecurring,
    RuleFailure, WriteOutcome,
};
pub use recurrence::{Frequency, RecurrenceRule, days_in_month};
pub use util::parse_entry_date;

mod budgets;
mod commands;
mod currency;
mod entries;
mod error;
mod import;
mod money;
mod month;
mod ops;
mod recurrence;
mod recurring_rules;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
