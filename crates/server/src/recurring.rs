//! Recurring rules API endpoints

use api_types::recurring::{
    ProcessDue, ProcessDueResponse, RuleFailureView, RuleListResponse, RuleNew, RuleView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    ServerError,
    convert::{currency_from_api, entry_view, rule_view},
    server::{Owner, ServerState},
};

pub async fn create(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Json(payload): Json<RuleNew>,
) -> Result<(StatusCode, Json<RuleView>), ServerError> {
    let frequency = engine::Frequency::new(
        payload.frequency.as_str(),
        payload.day_of_week,
        payload.day_of_month,
        payload.month_of_year,
    )?;

    let mut cmd = engine::NewRule::new(
        owner_id,
        engine::Money::new(payload.amount_minor),
        payload.category,
        payload.description,
        frequency,
        payload.start_date,
    );
    if let Some(currency) = payload.currency {
        cmd = cmd.currency(currency_from_api(currency));
    }
    if let Some(end_date) = payload.end_date {
        cmd = cmd.end_date(end_date);
    }

    let rule = state.engine.create_rule(cmd).await?;
    Ok((StatusCode::CREATED, Json(rule_view(rule))))
}

pub async fn get(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<RuleView>, ServerError> {
    let rule = state.engine.rule(&owner_id, rule_id).await?;
    Ok(Json(rule_view(rule)))
}

pub async fn list(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
) -> Result<Json<RuleListResponse>, ServerError> {
    let rules = state.engine.list_rules(&owner_id).await?;
    Ok(Json(RuleListResponse {
        rules: rules.into_iter().map(rule_view).collect(),
    }))
}

pub async fn toggle(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<RuleView>, ServerError> {
    let rule = state.engine.toggle_rule(&owner_id, rule_id).await?;
    Ok(Json(rule_view(rule)))
}

pub async fn delete(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_rule(&owner_id, rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Materializes the caller's due entries up to `as_of`.
pub async fn process(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Json(payload): Json<ProcessDue>,
) -> Result<Json<ProcessDueResponse>, ServerError> {
    let as_of = payload.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let processed = state.engine.process_due(Some(&owner_id), as_of).await?;

    Ok(Json(ProcessDueResponse {
        processed_count: processed.processed_count,
        skipped: processed.skipped,
        entries: processed.entries.into_iter().map(entry_view).collect(),
        errors: processed
            .errors
            .into_iter()
            .map(|failure| RuleFailureView {
                rule_id: failure.rule_id,
                message: failure.message,
            })
            .collect(),
    }))
}
