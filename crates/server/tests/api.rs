use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::Engine;
use migration::MigratorTrait;

async fn test_app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    server::app(engine)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    owner: Option<&str>,
    body: Option<Body>,
    content_type: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-owner-id", owner);
    }
    if body.is_some() {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(body.unwrap_or_else(Body::empty)).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    owner: &str,
    body: Value,
) -> (StatusCode, Value) {
    send(
        app,
        method,
        uri,
        Some(owner),
        Some(Body::from(body.to_string())),
        "application/json",
    )
    .await
}

#[tokio::test]
async fn missing_owner_header_is_rejected() {
    let app = test_app().await;
    let (status, _) = send(&app, Method::GET, "/entries", None, None, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn retried_create_returns_the_first_entry() {
    let app = test_app().await;
    let body = json!({
        "amount_minor": 12_050,
        "category": "food",
        "description": "Groceries",
        "date": "05/03/2024",
        "tags": ["Home"],
        "idempotency_key": "req-1"
    });

    let (first_status, first) =
        send_json(&app, Method::POST, "/entries", "alice", body.clone()).await;
    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(first["created"], json!(true));
    assert_eq!(first["entry"]["date"], json!("2024-03-05"));
    assert_eq!(first["entry"]["currency"], json!("INR"));
    assert_eq!(first["entry"]["tags"], json!(["home"]));

    let (second_status, second) = send_json(&app, Method::POST, "/entries", "alice", body).await;
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second["created"], json!(false));
    assert_eq!(second["entry"]["id"], first["entry"]["id"]);

    let (_, list) = send(&app, Method::GET, "/entries", Some("alice"), None, "").await;
    assert_eq!(list["entries"].as_array().map(Vec::len), Some(1));
    assert_eq!(list["next_cursor"], Value::Null);
}

#[tokio::test]
async fn invalid_entry_is_unprocessable() {
    let app = test_app().await;
    let (status, body) = send_json(
        &app,
        Method::POST,
        "/entries",
        "alice",
        json!({
            "amount_minor": 0,
            "category": "food",
            "description": "Nothing",
            "date": "2024-03-05"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn entries_of_other_owners_are_not_found() {
    let app = test_app().await;
    let (_, created) = send_json(
        &app,
        Method::POST,
        "/entries",
        "alice",
        json!({
            "amount_minor": 500,
            "category": "coffee",
            "description": "Espresso",
            "date": "2024-03-05"
        }),
    )
    .await;
    let id = created["entry"]["id"].as_str().unwrap().to_string();

    let uri = format!("/entries/{id}");
    let (status, _) = send(&app, Method::GET, &uri, Some("bob"), None, "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, Some("bob"), None, "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, Some("alice"), None, "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn processing_rules_twice_creates_entries_once() {
    let app = test_app().await;
    let (status, rule) = send_json(
        &app,
        Method::POST,
        "/recurring",
        "alice",
        json!({
            "amount_minor": 100_000,
            "category": "rent",
            "description": "Flat",
            "frequency": "monthly",
            "day_of_month": 31,
            "start_date": "2024-01-31"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rule["label"], json!("Monthly on day 31"));
    assert_eq!(rule["next_due_date"], json!("2024-01-31"));

    let as_of = json!({ "as_of": "2024-03-31" });
    let (_, first) =
        send_json(&app, Method::POST, "/recurring/process", "alice", as_of.clone()).await;
    assert_eq!(first["processed_count"], json!(3));
    assert_eq!(first["errors"], json!([]));
    let dates: Vec<&str> = first["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-01-31", "2024-02-29", "2024-03-31"]);
    assert_eq!(
        first["entries"][0]["description"],
        json!("[Recurring] Flat")
    );

    let (_, second) = send_json(&app, Method::POST, "/recurring/process", "alice", as_of).await;
    assert_eq!(second["processed_count"], json!(0));
}

#[tokio::test]
async fn rule_with_mismatched_anchor_is_rejected() {
    let app = test_app().await;
    let (status, _) = send_json(
        &app,
        Method::POST,
        "/recurring",
        "alice",
        json!({
            "amount_minor": 100,
            "category": "gym",
            "description": "Membership",
            "frequency": "weekly",
            "day_of_month": 3,
            "start_date": "2024-01-01"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn budget_overview_reports_alerts() {
    let app = test_app().await;
    let (_, budget) = send_json(
        &app,
        Method::POST,
        "/budgets",
        "alice",
        json!({ "category": "food", "monthly_limit_minor": 10_000 }),
    )
    .await;
    assert_eq!(budget["alert_threshold"], json!(80));

    send_json(
        &app,
        Method::POST,
        "/entries",
        "alice",
        json!({
            "amount_minor": 12_000,
            "category": "Food",
            "description": "Party",
            "date": "2024-03-10"
        }),
    )
    .await;

    let (status, overview) = send(
        &app,
        Method::GET,
        "/budgets/overview?month=2024-03",
        Some("alice"),
        None,
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["categories_over_budget"], json!(1));
    assert_eq!(overview["alerts"][0]["severity"], json!("danger"));
    assert_eq!(overview["budgets"][0]["remaining_minor"], json!(-2_000));

    let (status, _) = send(
        &app,
        Method::GET,
        "/budgets/overview?month=2024-13",
        Some("alice"),
        None,
        "",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn csv_import_commit_is_idempotent() {
    let app = test_app().await;
    let csv = "date,category,description,amount\n\
               2024-03-01,food,Groceries,45.50\n\
               2024-03-02,food,Dinner,abc\n";

    let (status, preview) = send(
        &app,
        Method::POST,
        "/import/preview",
        Some("alice"),
        Some(Body::from(csv)),
        "text/csv",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["valid_rows"], json!(1));
    assert_eq!(preview["errors"][0]["line"], json!(3));

    let (_, first) = send(
        &app,
        Method::POST,
        "/import/commit",
        Some("alice"),
        Some(Body::from(csv)),
        "text/csv",
    )
    .await;
    assert_eq!(first["success_count"], json!(1));
    assert_eq!(first["error_count"], json!(1));

    let (_, second) = send(
        &app,
        Method::POST,
        "/import/commit",
        Some("alice"),
        Some(Body::from(csv)),
        "text/csv",
    )
    .await;
    assert_eq!(second["duplicate_count"], json!(1));
    assert_eq!(second["entry_ids"], json!([]));

    let (status, _) = send(
        &app,
        Method::POST,
        "/import/commit",
        Some("alice"),
        Some(Body::from("when,amount\n2024-01-01,1\n")),
        "text/csv",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
