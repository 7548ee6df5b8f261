pub use sea_orm_migration::prelude::*;

mod m20260301_000001_ledger_entries;
mod m20260301_000002_recurring_rules;
mod m20260301_000003_budgets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_ledger_entries::Migration),
            Box::new(m20260301_000002_recurring_rules::Migration),
            Box::new(m20260301_000003_budgets::Migration),
        ]
    }
}
