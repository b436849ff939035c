//! Conversation management: list, read, rename/pin, share, soft-delete.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use quill_domain::{id, Error};

use crate::api::chat::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    pub device_id: String,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Response {
    match state.store.list_conversations(&query.device_id).await {
        Ok(conversations) => Json(conversations).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get_conversation(&id).await {
        Ok(Some(conversation)) if conversation.active => Json(conversation).into_response(),
        Ok(_) => error_response(&Error::NotFound(format!("conversation {id}"))),
        Err(err) => error_response(&err),
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.list_messages(&id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Partial update: only the supplied fields change.
#[derive(Debug, Deserialize)]
pub struct UpdateConversation {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pinned: Option<bool>,
}

pub async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateConversation>,
) -> Response {
    if let Some(title) = &update.title {
        let title = title.trim();
        if title.is_empty() {
            return error_response(&Error::Validation("title must not be empty".into()));
        }
        if let Err(err) = state.store.rename_conversation(&id, title).await {
            return error_response(&err);
        }
    }
    if let Some(pinned) = update.pinned {
        if let Err(err) = state.store.set_pinned(&id, pinned).await {
            return error_response(&err);
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Mint (or re-mint) a share token for the conversation.
pub async fn share_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let token = id::long_id();
    match state.store.set_share_token(&id, &token).await {
        Ok(()) => Json(serde_json::json!({ "shareToken": token })).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Soft delete: the record stays, the active flag clears.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.deactivate_conversation(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
