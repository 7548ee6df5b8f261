use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    CreateEntryCmd, DedupeKey, Engine, EngineError, EntryFilter, Frequency, Money, NewEntry,
    NewRule,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, DatabaseConnection, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("recurring_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();

    (engine, db, path)
}

async fn stored_count(db: &DatabaseConnection) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM ledger_entries",
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn rent(owner: &str, frequency: Frequency, start: NaiveDate) -> NewRule {
    NewRule::new(owner, Money::new(120_000), "rent", "Rent", frequency, start)
}

#[tokio::test]
async fn repeated_process_due_is_a_no_op() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();

    let first = engine
        .process_due(Some("alice"), date(2024, 3, 3))
        .await
        .unwrap();
    assert_eq!(first.processed_count, 3);

    let second = engine
        .process_due(Some("alice"), date(2024, 3, 3))
        .await
        .unwrap();
    assert_eq!(second.processed_count, 0);
    assert_eq!(second.skipped, 0);
    assert!(second.entries.is_empty());

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn missed_runs_materialize_in_order() {
    let (engine, _db) = engine_with_db().await;
    let rule = engine
        .create_rule(rent(
            "alice",
            Frequency::Weekly {
                weekday: Weekday::Mon,
            },
            date(2024, 1, 1),
        ))
        .await
        .unwrap();

    // Five Mondays between 2024-01-01 and 2024-01-29, none processed yet.
    let out = engine
        .process_due(Some("alice"), date(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(out.processed_count, 5);
    let dates: Vec<NaiveDate> = out.entries.iter().map(|e| e.occurred_on).collect();
    assert_eq!(
        dates,
        vec![
            date(2024, 1, 1),
            date(2024, 1, 8),
            date(2024, 1, 15),
            date(2024, 1, 22),
            date(2024, 1, 29)
        ]
    );
    for entry in &out.entries {
        assert_eq!(entry.rule_id, Some(rule.id));
        assert_eq!(entry.due_date, Some(entry.occurred_on));
        assert_eq!(entry.description, "[Recurring] Rent");
        assert_eq!(
            entry.dedupe,
            Some(DedupeKey::recurrence(rule.id, entry.occurred_on))
        );
    }

    let stored = engine.rule("alice", rule.id).await.unwrap();
    assert_eq!(stored.last_processed, Some(date(2024, 1, 29)));
}

#[tokio::test]
async fn monthly_day_31_lands_on_february_end() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_rule(rent(
            "alice",
            Frequency::Monthly { day: 31 },
            date(2024, 1, 31),
        ))
        .await
        .unwrap();
    engine
        .create_rule(rent("bob", Frequency::Monthly { day: 31 }, date(2023, 1, 31)))
        .await
        .unwrap();

    let leap = engine
        .process_due(Some("alice"), date(2024, 3, 1))
        .await
        .unwrap();
    let leap_dates: Vec<_> = leap.entries.iter().map(|e| e.occurred_on).collect();
    assert_eq!(leap_dates, vec![date(2024, 1, 31), date(2024, 2, 29)]);

    let common = engine
        .process_due(Some("bob"), date(2023, 3, 1))
        .await
        .unwrap();
    let common_dates: Vec<_> = common.entries.iter().map(|e| e.occurred_on).collect();
    assert_eq!(common_dates, vec![date(2023, 1, 31), date(2023, 2, 28)]);
}

#[tokio::test]
async fn process_due_without_owner_covers_everyone() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();
    engine
        .create_rule(rent("bob", Frequency::Daily, date(2024, 3, 2)))
        .await
        .unwrap();

    let out = engine.process_due(None, date(2024, 3, 2)).await.unwrap();
    assert_eq!(out.processed_count, 3);

    let bob = engine
        .list_entries("bob", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(bob.len(), 1);
}

#[tokio::test]
async fn existing_due_date_entry_is_skipped_not_duplicated() {
    let (engine, _db) = engine_with_db().await;
    let rule = engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();

    // Another trigger already wrote the entry for 03-02 but crashed before
    // advancing the checkpoint.
    let concurrent = engine
        .create_entry(
            CreateEntryCmd::new(
                "alice",
                NewEntry::new(Money::new(120_000), "rent", "[Recurring] Rent", date(2024, 3, 2)),
            )
            .dedupe(DedupeKey::recurrence(rule.id, date(2024, 3, 2))),
        )
        .await
        .unwrap();
    assert!(concurrent.created);

    let out = engine
        .process_due(Some("alice"), date(2024, 3, 3))
        .await
        .unwrap();
    assert_eq!(out.processed_count, 2);
    assert_eq!(out.skipped, 1);

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn end_date_stops_materialization() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_rule(
            rent("alice", Frequency::Daily, date(2024, 3, 1)).end_date(date(2024, 3, 2)),
        )
        .await
        .unwrap();

    let out = engine
        .process_due(Some("alice"), date(2024, 3, 31))
        .await
        .unwrap();
    assert_eq!(out.processed_count, 2);

    let err = engine
        .create_rule(
            rent("alice", Frequency::Daily, date(2024, 3, 5)).end_date(date(2024, 3, 1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RuleConfig(_)));
}

#[tokio::test]
async fn toggled_rule_backfills_on_reactivation() {
    let (engine, _db) = engine_with_db().await;
    let rule = engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();
    engine
        .process_due(Some("alice"), date(2024, 3, 1))
        .await
        .unwrap();

    let paused = engine.toggle_rule("alice", rule.id).await.unwrap();
    assert!(!paused.active);
    let out = engine
        .process_due(Some("alice"), date(2024, 3, 4))
        .await
        .unwrap();
    assert_eq!(out.processed_count, 0);

    let resumed = engine.toggle_rule("alice", rule.id).await.unwrap();
    assert!(resumed.active);
    assert_eq!(resumed.last_processed, Some(date(2024, 3, 1)));
    let out = engine
        .process_due(Some("alice"), date(2024, 3, 4))
        .await
        .unwrap();
    assert_eq!(out.processed_count, 3);
}

#[tokio::test]
async fn deleting_a_rule_keeps_its_entries() {
    let (engine, _db) = engine_with_db().await;
    let rule = engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();
    engine
        .process_due(Some("alice"), date(2024, 3, 2))
        .await
        .unwrap();

    engine.delete_rule("alice", rule.id).await.unwrap();
    assert!(matches!(
        engine.rule("alice", rule.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(engine.list_rules("alice").await.unwrap().is_empty());

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.rule_id == Some(rule.id)));
}

#[tokio::test]
async fn rules_are_private_to_their_owner() {
    let (engine, _db) = engine_with_db().await;
    let rule = engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();

    assert!(matches!(
        engine.toggle_rule("bob", rule.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.delete_rule("bob", rule.id).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert_eq!(engine.list_rules("alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_rule_is_reported_and_others_still_run() {
    let (engine, db) = engine_with_db().await;
    engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();
    let broken = engine
        .create_rule(rent("bob", Frequency::Daily, date(2024, 3, 1)))
        .await
        .unwrap();
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "UPDATE recurring_rules SET frequency = 'hourly' WHERE owner_id = 'bob'",
    ))
    .await
    .unwrap();

    let out = engine.process_due(None, date(2024, 3, 2)).await.unwrap();
    assert_eq!(out.processed_count, 2);
    assert!(out.entries.iter().all(|e| e.owner_id == "alice"));
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].rule_id, broken.id);
    assert_eq!(out.errors[0].owner_id, "bob");
    assert!(out.errors[0].message.contains("hourly"));

    // Still reported on the next run, and alice stays a no-op.
    let again = engine.process_due(None, date(2024, 3, 2)).await.unwrap();
    assert_eq!(again.processed_count, 0);
    assert_eq!(again.errors.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sweeps_store_each_due_date_once() {
    let (engine, db, path) = engine_with_file_db().await;
    for owner in ["alice", "bob", "carol"] {
        engine
            .create_rule(rent(owner, Frequency::Daily, date(2024, 3, 1)))
            .await
            .unwrap();
    }

    let engine = Arc::new(engine);
    let mut sweeps = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        sweeps.push(tokio::spawn(async move {
            engine.process_due(None, date(2024, 3, 10)).await
        }));
    }

    let mut processed = 0;
    for sweep in sweeps {
        let out = sweep.await.unwrap().unwrap();
        assert!(out.errors.is_empty());
        processed += out.processed_count;
    }

    assert_eq!(processed, 30);
    assert_eq!(stored_count(&db).await, 30);
    for owner in ["alice", "bob", "carol"] {
        let rules = engine.list_rules(owner).await.unwrap();
        assert_eq!(rules[0].last_processed, Some(date(2024, 3, 10)));
    }

    drop(engine);
    drop(db);
    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn toggling_during_a_sweep_keeps_the_checkpoint() {
    let (engine, db, path) = engine_with_file_db().await;
    let rule = engine
        .create_rule(rent("alice", Frequency::Daily, date(2024, 1, 1)))
        .await
        .unwrap();

    let (swept, toggled) = tokio::join!(
        engine.process_due(Some("alice"), date(2024, 3, 31)),
        engine.toggle_rule("alice", rule.id),
    );
    let swept = swept.unwrap();
    assert!(swept.errors.is_empty());
    assert!(!toggled.unwrap().active);

    // Whatever the interleaving, the checkpoint matches the last stored date.
    let stored = engine.rule("alice", rule.id).await.unwrap();
    assert!(!stored.active);
    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len() as i64, stored_count(&db).await);
    assert_eq!(
        stored.last_processed,
        entries.iter().map(|e| e.occurred_on).max()
    );

    drop(engine);
    drop(db);
    let _ = std::fs::remove_file(path);
}
