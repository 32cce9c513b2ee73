//! Linked sources API endpoints

use api_types::linked_source::{LinkedSourceNew, LinkedSourceView, SyncQueued};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{NewLinkedSourceCmd, Principal};

use crate::{ServerError, convert::linked_source_view, server::ServerState};

pub async fn create(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<LinkedSourceNew>,
) -> Result<(StatusCode, Json<LinkedSourceView>), ServerError> {
    let mut cmd = NewLinkedSourceCmd::new(payload.item_id, payload.access_token);
    cmd.institution_id = payload.institution_id;
    cmd.institution_name = payload.institution_name;

    let source = state.engine.save_linked_source(&principal, cmd).await?;
    Ok((StatusCode::CREATED, Json(linked_source_view(source))))
}

pub async fn list(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<LinkedSourceView>>, ServerError> {
    let sources = state.engine.linked_sources(&principal).await?;
    Ok(Json(sources.into_iter().map(linked_source_view).collect()))
}

/// Queue a reconciliation of the item; the work happens in the sync worker.
pub async fn sync(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(item_id): Path<String>,
) -> Result<(StatusCode, Json<SyncQueued>), ServerError> {
    let source = state
        .engine
        .linked_source_by_item(&principal, &item_id)
        .await?;
    state
        .queue
        .enqueue(principal.family_id, &source.item_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncQueued {
            item_id: source.item_id,
        }),
    ))
}
