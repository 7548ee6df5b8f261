use chrono::NaiveDate;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    AlertSeverity, BudgetInput, BudgetUpdate, CreateEntryCmd, Engine, EngineError, Money, Month,
    NewEntry,
};
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

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn march() -> Month {
    Month::new(2024, 3).unwrap()
}

async fn spend(engine: &Engine, owner: &str, category: &str, amount: i64, on: NaiveDate) {
    engine
        .create_entry(CreateEntryCmd::new(
            owner,
            NewEntry::new(Money::new(amount), category, "expense", on),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn overview_reports_warning_at_ninety_percent() {
    let (engine, _db) = engine_with_db().await;
    engine
        .upsert_budget("alice", BudgetInput::new("food", Money::new(50_000)).alert_threshold(80))
        .await
        .unwrap();
    spend(&engine, "alice", "food", 30_000, date(2024, 3, 2)).await;
    spend(&engine, "alice", "food", 15_000, date(2024, 3, 31)).await;
    // Outside the month, or another owner: not counted.
    spend(&engine, "alice", "food", 99_000, date(2024, 4, 1)).await;
    spend(&engine, "bob", "food", 99_000, date(2024, 3, 5)).await;

    let overview = engine.budget_overview("alice", march()).await.unwrap();
    assert_eq!(overview.budgets.len(), 1);
    let status = &overview.budgets[0];
    assert_eq!(status.spent, Money::new(45_000));
    assert_eq!(status.percentage_used, 90);
    assert!(status.is_alert);
    assert!(!status.is_over_budget);
    assert_eq!(status.severity(), Some(AlertSeverity::Warning));

    assert_eq!(overview.alerts.len(), 1);
    assert_eq!(overview.alerts[0].severity.as_str(), "warning");
    assert_eq!(overview.alerts[0].message, "Approaching limit: 90% used");
    assert_eq!(overview.total_budgeted, Money::new(50_000));
    assert_eq!(overview.total_spent, Money::new(45_000));
    assert_eq!(overview.categories_over_budget, 0);
}

#[tokio::test]
async fn overview_ranks_danger_before_warning() {
    let (engine, _db) = engine_with_db().await;
    engine
        .upsert_budget("alice", BudgetInput::new("food", Money::new(10_000)))
        .await
        .unwrap();
    engine
        .upsert_budget("alice", BudgetInput::new("travel", Money::new(10_000)))
        .await
        .unwrap();
    engine
        .upsert_budget("alice", BudgetInput::new("books", Money::new(10_000)))
        .await
        .unwrap();
    spend(&engine, "alice", "food", 8_500, date(2024, 3, 1)).await;
    spend(&engine, "alice", "Travel", 12_000, date(2024, 3, 1)).await;

    let overview = engine.budget_overview("alice", march()).await.unwrap();
    let ranked: Vec<(&str, AlertSeverity)> = overview
        .alerts
        .iter()
        .map(|a| (a.category.as_str(), a.severity))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("travel", AlertSeverity::Danger),
            ("food", AlertSeverity::Warning)
        ]
    );
    assert_eq!(overview.categories_over_budget, 1);
    assert_eq!(overview.alerts[0].message, "Over budget! Spent 120.00 of 100.00");

    let travel = overview
        .budgets
        .iter()
        .find(|s| s.budget.category == "travel")
        .unwrap();
    assert_eq!(travel.remaining, Money::new(-2_000));
}

#[tokio::test]
async fn upsert_updates_existing_category_in_place() {
    let (engine, _db) = engine_with_db().await;
    let first = engine
        .upsert_budget("alice", BudgetInput::new("food", Money::new(10_000)))
        .await
        .unwrap();
    assert_eq!(first.alert_threshold, 80);

    let second = engine
        .upsert_budget("alice", BudgetInput::new("Food", Money::new(20_000)).alert_threshold(50))
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.monthly_limit, Money::new(20_000));
    assert_eq!(second.alert_threshold, 50);
    assert_eq!(engine.list_budgets("alice").await.unwrap().len(), 1);

    let err = engine
        .upsert_budget("alice", BudgetInput::new("food", Money::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let err = engine
        .upsert_budget("alice", BudgetInput::new("food", Money::new(1)).alert_threshold(101))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn update_status_and_delete_budget() {
    let (engine, _db) = engine_with_db().await;
    let budget = engine
        .upsert_budget("alice", BudgetInput::new("food", Money::new(10_000)))
        .await
        .unwrap();
    spend(&engine, "alice", "food", 5_000, date(2024, 3, 10)).await;

    let updated = engine
        .update_budget(
            "alice",
            budget.id,
            BudgetUpdate {
                alert_threshold: Some(40),
                ..BudgetUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.alert_threshold, 40);
    assert_eq!(updated.monthly_limit, Money::new(10_000));

    let status = engine
        .budget_status("alice", budget.id, march())
        .await
        .unwrap();
    assert_eq!(status.percentage_used, 50);
    assert!(status.is_alert);

    assert!(matches!(
        engine.budget_status("bob", budget.id, march()).await,
        Err(EngineError::KeyNotFound(_))
    ));

    engine.delete_budget("alice", budget.id).await.unwrap();
    assert!(engine.list_budgets("alice").await.unwrap().is_empty());
    // Entries are untouched by budget deletion.
    let entries = engine
        .query_entries("alice", Some("food"), date(2024, 3, 1), date(2024, 4, 1))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn check_budget_on_expense_predicts_alerts() {
    let (engine, _db) = engine_with_db().await;
    engine
        .upsert_budget("alice", BudgetInput::new("food", Money::new(10_000)))
        .await
        .unwrap();
    spend(&engine, "alice", "food", 7_000, date(2024, 3, 3)).await;

    let none = engine
        .check_budget_on_expense("alice", "food", Money::new(500), march())
        .await
        .unwrap();
    assert!(none.is_none());

    let warning = engine
        .check_budget_on_expense("alice", "food", Money::new(1_500), march())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(warning.severity, AlertSeverity::Warning);
    assert_eq!(warning.percentage_used, 85);
    assert_eq!(warning.message, "This expense will use 85% of your food budget");

    let danger = engine
        .check_budget_on_expense("alice", "FOOD", Money::new(5_000), march())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(danger.severity, AlertSeverity::Danger);
    assert_eq!(danger.message, "This expense will exceed your food budget!");

    let no_budget = engine
        .check_budget_on_expense("alice", "travel", Money::new(1_000_000), march())
        .await
        .unwrap();
    assert!(no_budget.is_none());
}

#[tokio::test]
async fn huge_limits_and_expenses_do_not_overflow() {
    let (engine, _db) = engine_with_db().await;
    let big = Money::new(9_000_000_000_000_000_000);
    engine
        .upsert_budget("alice", BudgetInput::new("yachts", big))
        .await
        .unwrap();
    engine
        .upsert_budget("alice", BudgetInput::new("islands", big))
        .await
        .unwrap();
    spend(&engine, "alice", "yachts", big.minor(), date(2024, 3, 1)).await;

    let overview = engine.budget_overview("alice", march()).await.unwrap();
    assert_eq!(overview.total_budgeted, Money::new(i64::MAX));
    assert_eq!(overview.total_spent, big);

    let alert = engine
        .check_budget_on_expense("alice", "yachts", big, march())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.severity, AlertSeverity::Danger);
    assert_eq!(alert.spent, Money::new(i64::MAX));
}
