//! Accounts API endpoints

use api_types::account::{AccountCreated, AccountList, AccountNew, EntryList};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{NewAccountCmd, Principal};
use uuid::Uuid;

use crate::{
    ServerError,
    convert::{account_view, classification_from_api, currency_from_api, entry_view},
    server::ServerState,
};

pub async fn create(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountCreated>), ServerError> {
    let mut cmd = NewAccountCmd::new(payload.name, currency_from_api(payload.currency));
    if let Some(subtype) = payload.subtype {
        cmd = cmd.subtype(subtype);
    }
    if let Some(classification) = payload.classification {
        cmd = cmd.classification(classification_from_api(classification));
    }
    if let Some(balance) = payload.opening_balance {
        cmd = cmd.opening_balance(balance);
    }
    if let Some(date) = payload.opening_date {
        cmd = cmd.opening_date(date);
    }
    if let Some(external) = payload.external_account_id {
        cmd = cmd.external_account_id(external);
    }

    let id = state.engine.create_account(&principal, cmd).await?;
    Ok((StatusCode::CREATED, Json(AccountCreated { id })))
}

pub async fn list(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<AccountList>, ServerError> {
    let accounts = state.engine.list_active_accounts(&principal).await?;
    let net_worth = state.engine.net_worth(&principal).await?;

    Ok(Json(AccountList {
        accounts: accounts.into_iter().map(account_view).collect(),
        net_worth,
    }))
}

pub async fn entries(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<EntryList>, ServerError> {
    let entries = state.engine.list_entries(&principal, account_id).await?;
    Ok(Json(EntryList {
        entries: entries.into_iter().map(entry_view).collect(),
    }))
}

pub async fn archive(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.archive_account(&principal, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
