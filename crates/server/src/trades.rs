//! Trades API endpoints

use api_types::trade::{TradeCreated, TradeNew};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{EntryDraft, Principal, TradeDraft};

use crate::{ServerError, convert::trade_kind_from_api, server::ServerState};

/// Posts a trade against a security resolved by ticker.
///
/// The entry amount is derived from the trade, in the account currency.
pub async fn create(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<TradeNew>,
) -> Result<(StatusCode, Json<TradeCreated>), ServerError> {
    let engine = &state.engine;

    let account = engine.account(&principal, payload.account_id).await?;
    let security_id = engine
        .get_or_create_security(&payload.ticker, payload.security_name.as_deref())
        .await?;
    let trade = TradeDraft::new(
        security_id,
        payload.qty,
        payload.price,
        trade_kind_from_api(payload.kind),
    );
    let mut entry = EntryDraft::for_trade(
        account.id,
        &trade,
        &payload.ticker,
        account.currency,
        payload.date,
    )?;
    if let Some(external_id) = payload.external_id {
        entry = entry.external_id(external_id);
    }
    let amount = entry.amount;

    let posted = engine.post_trade(&principal, entry, trade).await?;
    let status = if posted.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(TradeCreated {
            entry_id: posted.entry_id,
            trade_id: posted.trade_id,
            amount,
            replayed: posted.replayed,
        }),
    ))
}
