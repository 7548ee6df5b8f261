//! Budgets API endpoints

use api_types::budget::{
    BudgetCheck, BudgetCheckResponse, BudgetListResponse, BudgetNew, BudgetOverviewView,
    BudgetStatusView, BudgetUpdate, BudgetView, MonthQuery,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    ServerError,
    convert::{alert_view, budget_view, month_or_current, status_view},
    server::{Owner, ServerState},
};

/// Creates the budget of a category, or replaces its limits when one exists.
pub async fn upsert(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Json(payload): Json<BudgetNew>,
) -> Result<Json<BudgetView>, ServerError> {
    let mut input =
        engine::BudgetInput::new(payload.category, engine::Money::new(payload.monthly_limit_minor));
    if let Some(threshold) = payload.alert_threshold {
        input = input.alert_threshold(threshold);
    }

    let budget = state.engine.upsert_budget(&owner_id, input).await?;
    Ok(Json(budget_view(budget)))
}

pub async fn get(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
) -> Result<Json<BudgetView>, ServerError> {
    let budget = state.engine.budget(&owner_id, budget_id).await?;
    Ok(Json(budget_view(budget)))
}

pub async fn list(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
) -> Result<Json<BudgetListResponse>, ServerError> {
    let budgets = state.engine.list_budgets(&owner_id).await?;
    Ok(Json(BudgetListResponse {
        budgets: budgets.into_iter().map(budget_view).collect(),
    }))
}

pub async fn update(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<BudgetUpdate>,
) -> Result<Json<BudgetView>, ServerError> {
    let update = engine::BudgetUpdate {
        monthly_limit: payload.monthly_limit_minor.map(engine::Money::new),
        alert_threshold: payload.alert_threshold,
    };

    let budget = state
        .engine
        .update_budget(&owner_id, budget_id, update)
        .await?;
    Ok(Json(budget_view(budget)))
}

pub async fn delete(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_budget(&owner_id, budget_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn status(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(budget_id): Path<Uuid>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<BudgetStatusView>, ServerError> {
    let month = month_or_current(query.month.as_deref())?;
    let status = state
        .engine
        .budget_status(&owner_id, budget_id, month)
        .await?;
    Ok(Json(status_view(status)))
}

pub async fn overview(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<BudgetOverviewView>, ServerError> {
    let month = month_or_current(query.month.as_deref())?;
    let overview = state.engine.budget_overview(&owner_id, month).await?;

    Ok(Json(BudgetOverviewView {
        month: overview.month.to_string(),
        total_budgeted_minor: overview.total_budgeted.minor(),
        total_spent_minor: overview.total_spent.minor(),
        categories_over_budget: overview.categories_over_budget,
        budgets: overview.budgets.into_iter().map(status_view).collect(),
        alerts: overview.alerts.into_iter().map(alert_view).collect(),
    }))
}

/// Predicts whether a prospective expense would raise a budget alert.
pub async fn check(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Json(payload): Json<BudgetCheck>,
) -> Result<Json<BudgetCheckResponse>, ServerError> {
    let month = month_or_current(payload.month.as_deref())?;
    let alert = state
        .engine
        .check_budget_on_expense(
            &owner_id,
            &payload.category,
            engine::Money::new(payload.amount_minor),
            month,
        )
        .await?;

    Ok(Json(BudgetCheckResponse {
        alert: alert.map(alert_view),
    }))
}
