use std::time::Duration;

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "outlay={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;

    if let Some(server) = settings.server {
        let engine = engine::Engine::builder().database(db.clone()).build().await?;
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            if let Err(err) = server::run_with_listener(engine, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if let Some(scheduler) = settings.scheduler {
        let engine = engine::Engine::builder().database(db.clone()).build().await?;
        tasks.spawn(async move {
            tracing::info!(
                interval_secs = scheduler.interval_secs,
                "Found scheduler settings..."
            );
            let mut interval =
                tokio::time::interval(Duration::from_secs(scheduler.interval_secs.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let today = Utc::now().date_naive();
                match engine.process_due(None, today).await {
                    Ok(processed) => tracing::info!(
                        processed = processed.processed_count,
                        skipped = processed.skipped,
                        failed = processed.errors.len(),
                        %today,
                        "recurring sweep done"
                    ),
                    // The next tick retries from the last checkpoint.
                    Err(err) => tracing::error!("recurring sweep failed: {err}"),
                }
            }
        });
    }

    if tasks.is_empty() {
        tracing::warn!("neither server nor scheduler configured, nothing to do");
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
