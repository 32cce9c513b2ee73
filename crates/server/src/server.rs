use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use std::{sync::Arc, time::Duration};

use crate::{ServerError, accounts, linked_sources, trades, transactions};
use engine::{Engine, EngineError, Principal, sync::SyncQueue};

static FAMILY_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-family-id");
static USER_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub queue: SyncQueue,
    /// Deadline of one request; an unfinished posting is rolled back.
    pub request_timeout: Duration,
}

/// `TypedHeader`s carrying the identity set by the trusted proxy in front
/// of the server. Both must be UUIDs.
macro_rules! uuid_header {
    ($name:ident, $header:ident, $label:literal) => {
        #[derive(Debug)]
        struct $name(Uuid);

        impl Header for $name {
            fn name() -> &'static axum::http::HeaderName {
                &$header
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
                let Ok(value) = Uuid::parse_str(value.trim()) else {
                    return Err(AxumError::invalid());
                };

                Ok($name(value))
            }

            fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
                match axum::http::HeaderValue::from_str(&self.0.to_string()) {
                    Ok(value) => values.extend(std::iter::once(value)),
                    Err(_) => tracing::error!("failed to encode {} header", $label),
                }
            }
        }
    };
}

uuid_header!(FamilyHeader, FAMILY_HEADER, "x-family-id");
uuid_header!(UserHeader, USER_HEADER, "x-user-id");

async fn principal(
    family: Option<TypedHeader<FamilyHeader>>,
    user: Option<TypedHeader<UserHeader>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (Some(TypedHeader(family)), Some(TypedHeader(user))) = (family, user) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request
        .extensions_mut()
        .insert(Principal::user(family.0, user.0));
    Ok(next.run(request).await)
}

/// Drops the handler future once the deadline passes, which rolls back any
/// posting still in flight.
async fn deadline(State(state): State<ServerState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    match tokio::time::timeout(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(%path, timeout_ms = state.request_timeout.as_millis() as u64, "request deadline exceeded");
            ServerError::from(EngineError::Cancelled).into_response()
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/accounts", post(accounts::create).get(accounts::list))
        .route("/accounts/{id}/entries", get(accounts::entries))
        .route("/accounts/{id}/archive", post(accounts::archive))
        .route("/transactions", post(transactions::create))
        .route("/transfers", post(transactions::transfer))
        .route("/trades", post(trades::create))
        .route(
            "/linked-sources",
            post(linked_sources::create).get(linked_sources::list),
        )
        .route("/linked-sources/{item_id}/sync", post(linked_sources::sync))
        .route_layer(middleware::from_fn_with_state(state.clone(), deadline))
        .route_layer(middleware::from_fn(principal))
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener, shutdown).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
