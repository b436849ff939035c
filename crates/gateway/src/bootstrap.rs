//! Wires concrete implementations into [`AppState`].

use std::sync::Arc;

use quill_domain::config::Config;
use quill_domain::Result;
use quill_providers::OpenAiCompatProvider;
use quill_store::JsonStore;

use crate::runtime::limiter::FixedWindowLimiter;
use crate::state::AppState;

/// Builds the production state: JSON-file store, OpenAI-compatible
/// provider, and a fixed-window rate limiter driven by config.
///
/// The concrete store handle is returned alongside the state so the
/// server can run a final flush on shutdown.
pub fn build_app_state(config: Config) -> Result<(AppState, Arc<JsonStore>)> {
    let store = Arc::new(JsonStore::open(&config.storage.data_dir)?);
    let provider = OpenAiCompatProvider::from_config(&config.generation)?;
    let limiter = FixedWindowLimiter::new(config.limits.rate_limit.clone());

    let state = AppState {
        config: Arc::new(config),
        store: store.clone(),
        provider: Arc::new(provider),
        limiter: Arc::new(limiter),
    };
    Ok((state, store))
}
