//! Shared application state handed to every request handler.

use std::sync::Arc;

use quill_domain::config::Config;
use quill_providers::GenerationProvider;
use quill_store::ConversationStore;

use crate::runtime::limiter::RateLimiter;

/// Cheap to clone; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ConversationStore>,
    pub provider: Arc<dyn GenerationProvider>,
    pub limiter: Arc<dyn RateLimiter>,
}
