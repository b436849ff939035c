//! Document listing for the chat client's selection UI.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::chat::error_response;
use crate::api::conversations::DeviceQuery;
use crate::state::AppState;

/// Listing view: document text never travels over this endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub byte_size: u64,
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Response {
    match state.store.list_documents(&query.device_id).await {
        Ok(documents) => {
            let summaries: Vec<DocumentSummary> = documents
                .into_iter()
                .map(|doc| DocumentSummary {
                    id: doc.id,
                    name: doc.name,
                    byte_size: doc.byte_size,
                })
                .collect();
            Json(summaries).into_response()
        }
        Err(err) => error_response(&err),
    }
}
