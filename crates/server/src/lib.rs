use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener, spawn_with_listener};

mod accounts;
mod convert;
mod linked_sources;
mod server;
mod trades;
mod transactions;

pub mod types {
    pub mod account {
        pub use api_types::account::{
            AccountCreated, AccountList, AccountNew, AccountView, Classification, EntryKind,
            EntryList, EntryView,
        };
    }

    pub mod transaction {
        pub use api_types::transaction::{
            TransactionCreated, TransactionNew, TransferCreated, TransferNew,
        };
    }

    pub mod trade {
        pub use api_types::trade::{TradeCreated, TradeKind, TradeNew};
    }

    pub mod linked_source {
        pub use api_types::linked_source::{
            LinkedSourceNew, LinkedSourceView, SourceStatus, SyncQueued,
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
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Database(_) | EngineError::Credential(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EngineError::ExternalFeed(_) => StatusCode::BAD_GATEWAY,
        EngineError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        EngineError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::Credential(reason) => {
            tracing::error!("credential error: {reason}");
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
