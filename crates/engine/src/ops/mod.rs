use sea_orm::DatabaseConnection;

use crate::{LedgerEntry, ResultEngine};

mod budgets;
mod entries;
mod import;
mod scheduler;

pub use entries::EntryFilter;
pub use import::{ImportPreview, ImportResult};
pub use scheduler::{ProcessedRecurring, RuleFailure};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Result of an idempotent write.
///
/// `created == false` means an entry with the same dedupe key already
/// existed; `entry` is then the stored one, untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub entry: LedgerEntry,
    pub created: bool,
}

impl WriteOutcome {
    pub(crate) fn created(entry: LedgerEntry) -> Self {
        Self {
            entry,
            created: true,
        }
    }

    pub(crate) fn existing(entry: LedgerEntry) -> Self {
        Self {
            entry,
            created: false,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
