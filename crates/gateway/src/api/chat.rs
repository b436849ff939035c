//! The turn endpoint: `POST /v1/turns`.
//!
//! The response body is the raw assistant text, streamed as it decodes.
//! Everything the client needs besides the text travels in headers, set
//! before the first byte: `x-conversation-id` (always) and `x-sources`
//! (when grounding documents contributed).

use axum::body::Body;
use axum::extract::State;
use axum::http::{header::HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use quill_domain::Error;
use quill_providers::PromptMessage;

use crate::runtime::turn::{self, TurnInput};
use crate::state::AppState;

pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";
pub const SOURCES_HEADER: &str = "x-sources";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn submit_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Response {
    let input = match validate(req) {
        Ok(input) => input,
        Err(err) => return error_response(&err),
    };

    match turn::start_turn(&state, input).await {
        Ok(handle) => stream_response(handle),
        Err(err) => error_response(&err),
    }
}

fn validate(req: TurnRequest) -> Result<TurnInput, Error> {
    let device_id = req
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("deviceId is required".into()))?
        .to_owned();
    if req.messages.is_empty() {
        return Err(Error::Validation("messages must not be empty".into()));
    }

    let mut history = Vec::with_capacity(req.messages.len());
    for msg in &req.messages {
        let entry = match msg.role.as_str() {
            "user" => PromptMessage::user(&msg.content),
            "assistant" => PromptMessage::assistant(&msg.content),
            other => {
                return Err(Error::Validation(format!(
                    "unsupported message role: {other}"
                )))
            }
        };
        history.push(entry);
    }
    if req.messages.last().map(|m| m.role.as_str()) != Some("user") {
        return Err(Error::Validation(
            "the last message must be from the user".into(),
        ));
    }

    Ok(TurnInput {
        device_id,
        conversation_id: req.conversation_id,
        history,
        document_ids: req.document_ids,
    })
}

fn stream_response(handle: turn::TurnHandle) -> Response {
    let mut deltas = handle.deltas;
    let body = Body::from_stream(async_stream::stream! {
        while let Some(text) = deltas.recv().await {
            yield Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(text));
        }
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; charset=utf-8");
    if let Ok(value) = HeaderValue::from_str(handle.conversation_id.as_str()) {
        response = response.header(HeaderName::from_static(CONVERSATION_ID_HEADER), value);
    }
    if !handle.source_names.is_empty() {
        // Skipped rather than rejected when a name is not header-safe.
        if let Ok(value) = HeaderValue::from_str(&handle.source_names.join(", ")) {
            response = response.header(HeaderName::from_static(SOURCES_HEADER), value);
        }
    }
    response
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Map runtime errors onto the response-status contract.
pub fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Provider { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = serde_json::json!({ "error": err.to_string() });
    (status, Json(body)).into_response()
}
