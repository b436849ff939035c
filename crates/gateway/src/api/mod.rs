//! HTTP surface: route table plus the handler modules.

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod chat;
pub mod conversations;
pub mod documents;

/// Build the full route table. State is attached by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/v1/turns", post(chat::submit_turn))
        .route(
            "/v1/conversations",
            get(conversations::list_conversations),
        )
        .route(
            "/v1/conversations/:id",
            get(conversations::get_conversation)
                .patch(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route(
            "/v1/conversations/:id/messages",
            get(conversations::list_messages),
        )
        .route(
            "/v1/conversations/:id/share",
            post(conversations::share_conversation),
        )
        .route("/v1/documents", get(documents::list_documents))
}

async fn health() -> &'static str {
    "ok"
}
