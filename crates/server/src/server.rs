use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};

use std::{net::SocketAddr, sync::Arc};

use crate::{budgets, entries, import, recurring};
use engine::Engine;

static OWNER_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-owner-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// Identity of the caller, inserted by the owner middleware.
#[derive(Clone, Debug)]
pub struct Owner(pub String);

/// `TypedHeader` for the owner header
///
/// Every request must carry a non-empty "x-owner-id" header. Authentication
/// happens upstream; the header is trusted as is.
#[derive(Debug)]
struct OwnerHeader(String);

impl Header for OwnerHeader {
    fn name() -> &'static axum::http::HeaderName {
        &OWNER_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(OwnerHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-owner-id header"),
        }
    }
}

async fn owner(
    owner_header: Option<TypedHeader<OwnerHeader>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(OwnerHeader(owner_id))) = owner_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(Owner(owner_id));
    Ok(next.run(request).await)
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/entries", get(entries::list).post(entries::create))
        .route("/entries/categories", get(entries::categories))
        .route(
            "/entries/{id}",
            get(entries::get)
                .patch(entries::update)
                .delete(entries::delete),
        )
        .route("/recurring", get(recurring::list).post(recurring::create))
        .route("/recurring/process", post(recurring::process))
        .route(
            "/recurring/{id}",
            get(recurring::get).delete(recurring::delete),
        )
        .route("/recurring/{id}/toggle", post(recurring::toggle))
        .route("/budgets", get(budgets::list).post(budgets::upsert))
        .route("/budgets/overview", get(budgets::overview))
        .route("/budgets/check", post(budgets::check))
        .route(
            "/budgets/{id}",
            get(budgets::get)
                .patch(budgets::update)
                .delete(budgets::delete),
        )
        .route("/budgets/{id}/status", get(budgets::status))
        .route("/import/preview", post(import::preview))
        .route("/import/commit", post(import::commit))
        .route_layer(middleware::from_fn(owner))
        .with_state(state)
}

/// Router over `engine`, without binding a listener.
pub fn app(engine: Engine) -> Router {
    router(ServerState {
        engine: Arc::new(engine),
    })
}

pub async fn run(engine: Engine, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(engine)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
