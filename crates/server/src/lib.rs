use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{Owner, app, run, run_with_listener, spawn_with_listener};

mod budgets;
mod convert;
mod entries;
mod import;
mod recurring;
mod server;

pub mod types {
    pub mod entry {
        pub use api_types::entry::{
            CategoriesResponse, EntryCreated, EntryList, EntryListResponse, EntryNew, EntryUpdate,
            EntryView,
        };
    }

    pub mod recurring {
        pub use api_types::recurring::{
            Frequency, ProcessDue, ProcessDueResponse, RuleFailureView, RuleListResponse, RuleNew,
            RuleView,
        };
    }

    pub mod budget {
        pub use api_types::budget::{
            AlertSeverity, BudgetAlertView, BudgetCheck, BudgetCheckResponse, BudgetListResponse,
            BudgetNew, BudgetOverviewView, BudgetStatusView, BudgetUpdate, BudgetView, MonthQuery,
        };
    }

    pub mod import {
        pub use api_types::import::{
            ImportPreviewView, ImportResultView, ImportRowErrorView, ImportRowView,
        };
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::Database(_) if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
        EngineError::Validation(_) | EngineError::RuleConfig(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
