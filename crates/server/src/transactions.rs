//! Transactions and transfers API endpoints

use api_types::transaction::{TransactionCreated, TransactionNew, TransferCreated, TransferNew};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{EntryDraft, Principal, TransactionDraft};

use crate::{ServerError, server::ServerState};

fn optional_name(value: Option<String>) -> Option<String> {
    value.filter(|name| !name.trim().is_empty())
}

pub async fn create(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let engine = &state.engine;

    let mut detail = TransactionDraft::standard();
    if let Some(merchant) = optional_name(payload.merchant) {
        detail = detail.merchant_id(engine.get_or_create_merchant(&principal, &merchant).await?);
    }
    if let Some(category) = optional_name(payload.category) {
        detail = detail.category_id(engine.get_or_create_category(&principal, &category).await?);
    }

    let mut entry = EntryDraft::new(payload.account_id, payload.amount, payload.date, payload.name);
    if let Some(external_id) = payload.external_id {
        entry = entry.external_id(external_id);
    }

    let posted = engine.post_transaction(&principal, entry, detail).await?;
    let status = if posted.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(TransactionCreated {
            entry_id: posted.entry_id,
            transaction_id: posted.transaction_id,
            replayed: posted.replayed,
        }),
    ))
}

pub async fn transfer(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<TransferNew>,
) -> Result<(StatusCode, Json<TransferCreated>), ServerError> {
    let received = payload.received_amount.unwrap_or(payload.amount);
    let from = EntryDraft::new(
        payload.from_account_id,
        -payload.amount,
        payload.date,
        payload.name.clone(),
    );
    let to = EntryDraft::new(payload.to_account_id, received, payload.date, payload.name);

    let posted = state.engine.post_transfer(&principal, from, to).await?;
    Ok((
        StatusCode::CREATED,
        Json(TransferCreated {
            transaction_id: posted.transaction_id,
            from_entry_id: posted.from_entry_id,
            to_entry_id: posted.to_entry_id,
        }),
    ))
}
