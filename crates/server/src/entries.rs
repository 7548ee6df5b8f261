//! Ledger entries API endpoints

use api_types::entry::{
    CategoriesResponse, EntryCreated, EntryList, EntryListResponse, EntryNew, EntryUpdate,
    EntryView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    ServerError,
    convert::{currency_from_api, entry_view},
    server::{Owner, ServerState},
};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 200;

pub async fn create(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Json(payload): Json<EntryNew>,
) -> Result<(StatusCode, Json<EntryCreated>), ServerError> {
    let occurred_on = engine::parse_entry_date(&payload.date)?;
    let mut entry = engine::NewEntry::new(
        engine::Money::new(payload.amount_minor),
        payload.category,
        payload.description,
        occurred_on,
    )
    .tags(payload.tags.unwrap_or_default());
    if let Some(currency) = payload.currency {
        entry = entry.currency(currency_from_api(currency));
    }
    if let Some(notes) = payload.notes {
        entry = entry.notes(notes);
    }

    let mut cmd = engine::CreateEntryCmd::new(owner_id, entry);
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }

    let outcome = state.engine.create_entry(cmd).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(EntryCreated {
            created: outcome.created,
            entry: entry_view(outcome.entry),
        }),
    ))
}

pub async fn get(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<EntryView>, ServerError> {
    let entry = state.engine.entry(&owner_id, entry_id).await?;
    Ok(Json(entry_view(entry)))
}

pub async fn list(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Query(query): Query<EntryList>,
) -> Result<Json<EntryListResponse>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ServerError::Generic(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let filter = engine::EntryFilter {
        from: query.from,
        to: query.to,
        category: query.category,
        search: query.search,
        tag: query.tag,
        min_amount: query.min_amount_minor.map(engine::Money::new),
        max_amount: query.max_amount_minor.map(engine::Money::new),
    };

    let (entries, next_cursor) = state
        .engine
        .list_entries_page(&owner_id, limit, query.cursor.as_deref(), &filter)
        .await?;

    Ok(Json(EntryListResponse {
        entries: entries.into_iter().map(entry_view).collect(),
        next_cursor,
    }))
}

pub async fn categories(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
) -> Result<Json<CategoriesResponse>, ServerError> {
    let categories = state.engine.categories(&owner_id).await?;
    Ok(Json(CategoriesResponse { categories }))
}

pub async fn update(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<EntryUpdate>,
) -> Result<Json<EntryView>, ServerError> {
    let occurred_on = payload
        .date
        .as_deref()
        .map(engine::parse_entry_date)
        .transpose()?;
    let notes = payload
        .notes
        .map(|notes| (!notes.trim().is_empty()).then_some(notes));

    let update = engine::EntryUpdate {
        amount: payload.amount_minor.map(engine::Money::new),
        currency: payload.currency.map(currency_from_api),
        category: payload.category,
        description: payload.description,
        occurred_on,
        tags: payload.tags,
        notes,
    };

    let entry = state.engine.update_entry(&owner_id, entry_id, update).await?;
    Ok(Json(entry_view(entry)))
}

pub async fn delete(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_entry(&owner_id, entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
