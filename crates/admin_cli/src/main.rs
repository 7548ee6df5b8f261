use std::{error::Error, path::PathBuf};

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{Engine, Month};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "outlay_admin")]
#[command(about = "Admin utilities for Outlay (scheduler runs, imports, budgets)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./outlay.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Recurring(Recurring),
    Import(Import),
    Budget(Budget),
}

#[derive(Args, Debug)]
struct Recurring {
    #[command(subcommand)]
    command: RecurringCommand,
}

#[derive(Subcommand, Debug)]
enum RecurringCommand {
    /// Materialize every due recurring entry up to `--as-of`.
    Process(ProcessArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Restrict the run to one owner; every owner otherwise.
    #[arg(long)]
    owner: Option<String>,
    /// Reference date (YYYY-MM-DD), today (UTC) by default.
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct Import {
    #[command(subcommand)]
    command: ImportCommand,
}

#[derive(Subcommand, Debug)]
enum ImportCommand {
    /// Validate a CSV file without writing anything.
    Preview(ImportArgs),
    /// Import a CSV file. Rows already imported are skipped.
    Commit(ImportArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long)]
    owner: String,
    file: PathBuf,
}

#[derive(Args, Debug)]
struct Budget {
    #[command(subcommand)]
    command: BudgetCommand,
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    Overview(OverviewArgs),
}

#[derive(Args, Debug)]
struct OverviewArgs {
    #[arg(long)]
    owner: String,
    /// Month (YYYY-MM), the current one by default.
    #[arg(long)]
    month: Option<Month>,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn read_rows(file: &PathBuf) -> Result<Vec<engine::RawRow>, Box<dyn Error + Send + Sync>> {
    let text = std::fs::read_to_string(file)?;
    Ok(engine::parse_csv(&text)?)
}

fn print_row_errors(errors: &[engine::ImportRowError]) {
    for err in errors {
        eprintln!("line {}: {}", err.line, err.message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Recurring(Recurring {
            command: RecurringCommand::Process(args),
        }) => {
            let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
            let processed = engine.process_due(args.owner.as_deref(), as_of).await?;
            for entry in &processed.entries {
                println!(
                    "{} {} {} {} {}",
                    entry.occurred_on,
                    entry.owner_id,
                    entry.category,
                    entry.amount,
                    entry.currency.code()
                );
            }
            for failure in &processed.errors {
                eprintln!(
                    "rule {} ({}): {}",
                    failure.rule_id, failure.owner_id, failure.message
                );
            }
            println!(
                "processed {} entries ({} already present, {} rules failed) up to {as_of}",
                processed.processed_count,
                processed.skipped,
                processed.errors.len()
            );
        }
        Command::Import(Import {
            command: ImportCommand::Preview(args),
        }) => {
            let rows = read_rows(&args.file)?;
            let preview = engine.preview_import(&args.owner, &rows)?;
            print_row_errors(&preview.errors);
            println!(
                "{} rows: {} valid, {} invalid, estimated total {}",
                preview.total_rows,
                preview.valid_rows,
                preview.invalid_rows,
                preview.estimated_total
            );
        }
        Command::Import(Import {
            command: ImportCommand::Commit(args),
        }) => {
            let rows = read_rows(&args.file)?;
            let result = engine.commit_import(&args.owner, &rows).await?;
            print_row_errors(&result.errors);
            println!(
                "{} rows: {} imported ({} new, {} duplicates), {} errors",
                result.total_rows,
                result.success_count,
                result.entry_ids.len(),
                result.duplicate_count,
                result.error_count
            );
        }
        Command::Budget(Budget {
            command: BudgetCommand::Overview(args),
        }) => {
            let month = args
                .month
                .unwrap_or_else(|| Month::of(Utc::now().date_naive()));
            let overview = engine.budget_overview(&args.owner, month).await?;
            for status in &overview.budgets {
                println!(
                    "{:<20} {:>12} / {:>12} {:>4}%",
                    status.budget.category,
                    status.spent,
                    status.budget.monthly_limit,
                    status.percentage_used
                );
            }
            for alert in &overview.alerts {
                println!("[{}] {}: {}", alert.severity.as_str(), alert.category, alert.message);
            }
            println!(
                "{month}: spent {} of {} ({} over budget)",
                overview.total_spent, overview.total_budgeted, overview.categories_over_budget
            );
        }
    }

    Ok(())
}
