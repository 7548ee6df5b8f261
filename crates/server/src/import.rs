//! CSV import endpoints. The request body is the raw CSV text.

use api_types::import::{ImportPreviewView, ImportResultView};
use axum::{
    Extension, Json,
    extract::State,
};

use crate::{
    ServerError,
    convert::{import_row_view, row_error_view},
    server::{Owner, ServerState},
};

pub async fn preview(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    body: String,
) -> Result<Json<ImportPreviewView>, ServerError> {
    let rows = engine::parse_csv(&body)?;
    let preview = state.engine.preview_import(&owner_id, &rows)?;

    Ok(Json(ImportPreviewView {
        total_rows: preview.total_rows,
        valid_rows: preview.valid_rows,
        invalid_rows: preview.invalid_rows,
        errors: preview.errors.into_iter().map(row_error_view).collect(),
        sample_valid_entries: preview
            .sample_valid_entries
            .into_iter()
            .map(import_row_view)
            .collect(),
        estimated_total_minor: preview.estimated_total.minor(),
    }))
}

pub async fn commit(
    Extension(Owner(owner_id)): Extension<Owner>,
    State(state): State<ServerState>,
    body: String,
) -> Result<Json<ImportResultView>, ServerError> {
    let rows = engine::parse_csv(&body)?;
    let result = state.engine.commit_import(&owner_id, &rows).await?;

    Ok(Json(ImportResultView {
        success_count: result.success_count,
        error_count: result.error_count,
        duplicate_count: result.duplicate_count,
        total_rows: result.total_rows,
        errors: result.errors.into_iter().map(row_error_view).collect(),
        entry_ids: result.entry_ids,
    }))
}
