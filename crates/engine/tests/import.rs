use sea_orm::{Database, DatabaseConnection};

use engine::{Currency, Engine, EngineError, EntryFilter, Money, parse_csv};
use migration::MigratorTrait;

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

/// Five data rows; the third one (file line 4) has a non-numeric amount.
const STATEMENT: &str = "\
date,category,description,amount,currency,tags,notes
2024-03-01,food,Groceries,45.50,INR,\"home,weekly\",
2024-03-02,transport,Metro card,\"₹1,200.00\",,,monthly pass
2024-03-03,food,Dinner,abc,,,
05/03/2024,utilities,Electricity,980,usd,,
2024-03-06,food,Coffee,3.20,XYZ,,
";

#[tokio::test]
async fn preview_reports_bad_row_and_writes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let rows = parse_csv(STATEMENT).unwrap();

    let preview = engine.preview_import("alice", &rows).unwrap();
    assert_eq!(preview.total_rows, 5);
    assert_eq!(preview.valid_rows, 4);
    assert_eq!(preview.invalid_rows, 1);
    assert_eq!(preview.errors.len(), 1);
    assert_eq!(preview.errors[0].line, 4);
    assert_eq!(preview.errors[0].message, "invalid amount: abc");
    assert_eq!(preview.sample_valid_entries.len(), 4);
    assert_eq!(
        preview.estimated_total,
        Money::new(4_550 + 120_000 + 98_000 + 320)
    );

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn commit_creates_valid_rows_only() {
    let (engine, _db) = engine_with_db().await;
    let rows = parse_csv(STATEMENT).unwrap();

    let result = engine.commit_import("alice", &rows).await.unwrap();
    assert_eq!(result.total_rows, 5);
    assert_eq!(result.success_count, 4);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.duplicate_count, 0);
    assert_eq!(result.entry_ids.len(), 4);
    assert_eq!(result.errors[0].line, 4);
    assert_eq!(result.errors[0].fields.get("amount").map(String::as_str), Some("abc"));

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 4);

    let electricity = entries
        .iter()
        .find(|e| e.description == "Electricity")
        .unwrap();
    assert_eq!(electricity.currency, Currency::Usd);
    assert_eq!(electricity.amount, Money::new(98_000));
    let coffee = entries.iter().find(|e| e.description == "Coffee").unwrap();
    assert_eq!(coffee.currency, Currency::Inr);
    let groceries = entries.iter().find(|e| e.description == "Groceries").unwrap();
    assert!(groceries.tags.contains("home") && groceries.tags.contains("weekly"));
    let metro = entries.iter().find(|e| e.description == "Metro card").unwrap();
    assert_eq!(metro.notes.as_deref(), Some("monthly pass"));
}

#[tokio::test]
async fn resubmitting_the_same_file_does_not_duplicate() {
    let (engine, _db) = engine_with_db().await;
    let rows = parse_csv(STATEMENT).unwrap();

    let first = engine.commit_import("alice", &rows).await.unwrap();
    let second = engine.commit_import("alice", &rows).await.unwrap();

    assert_eq!(second.success_count, 4);
    assert_eq!(second.duplicate_count, 4);
    assert!(second.entry_ids.is_empty());
    assert_eq!(first.entry_ids.len(), 4);

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn identical_rows_in_one_file_are_both_imported() {
    let (engine, _db) = engine_with_db().await;
    let text = "\
date,category,description,amount
2024-03-01,coffee,Espresso,2.50
2024-03-01,coffee,Espresso,2.50
";
    let rows = parse_csv(text).unwrap();

    let first = engine.commit_import("alice", &rows).await.unwrap();
    assert_eq!(first.entry_ids.len(), 2);
    let second = engine.commit_import("alice", &rows).await.unwrap();
    assert_eq!(second.duplicate_count, 2);

    let entries = engine
        .list_entries("alice", &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn same_file_for_two_owners_imports_twice() {
    let (engine, _db) = engine_with_db().await;
    let rows = parse_csv(STATEMENT).unwrap();

    engine.commit_import("alice", &rows).await.unwrap();
    let bob = engine.commit_import("bob", &rows).await.unwrap();
    assert_eq!(bob.entry_ids.len(), 4);
    assert_eq!(bob.duplicate_count, 0);
}

#[test]
fn header_problems_reject_the_whole_file() {
    let err = parse_csv("when,amount\n2024-01-01,1\n").unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation("missing required columns: date, category, description".to_string())
    );
}

#[tokio::test]
async fn preview_total_of_huge_amounts_saturates() {
    let (engine, _db) = engine_with_db().await;
    let text = "\
date,category,description,amount
2024-03-01,assets,Yacht,90000000000000000.00
2024-03-02,assets,Island,90000000000000000.00
";
    let rows = parse_csv(text).unwrap();

    let preview = engine.preview_import("alice", &rows).unwrap();
    assert_eq!(preview.valid_rows, 2);
    assert_eq!(preview.estimated_total, Money::new(i64::MAX));
}

#[tokio::test]
async fn separator_characters_do_not_merge_distinct_rows() {
    let (engine, _db) = engine_with_db().await;
    let first = parse_csv("date,category,description,amount\n2024-03-01,x|y,z,1.00\n").unwrap();
    let second = parse_csv("date,category,description,amount\n2024-03-01,x,y|z,1.00\n").unwrap();

    engine.commit_import("alice", &first).await.unwrap();
    let result = engine.commit_import("alice", &second).await.unwrap();
    assert_eq!(result.duplicate_count, 0);
    assert_eq!(result.entry_ids.len(), 1);

    let mut categories = engine.categories("alice").await.unwrap();
    categories.sort();
    assert_eq!(categories, vec!["x".to_string(), "x|y".to_string()]);
}
