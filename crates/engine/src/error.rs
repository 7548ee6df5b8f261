//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when an entry, a budget or an import row carries
//!   malformed data (amount, date, category, ...).
//! - [`RuleConfig`] thrown when a recurrence rule anchor does not match its
//!   frequency.
//! - [`KeyNotFound`] thrown when an item are not found.
//!
//! A duplicate write is *not* an error: the ledger writer returns the stored
//! entry instead (see [`WriteOutcome`]).
//!
//!  [`Validation`]: EngineError::Validation
//!  [`RuleConfig`]: EngineError::RuleConfig
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`WriteOutcome`]: super::WriteOutcome
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid recurrence rule: {0}")]
    RuleConfig(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the failure comes from the storage being
    /// unreachable, so the caller can retry the whole operation.
    ///
    /// Work committed before the failure (e.g. due dates already
    /// materialized by the scheduler) stays committed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::RuleConfig(a), Self::RuleConfig(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
