//! Per-device turn rate limiting.
//!
//! The limiter is an injected capability on [`AppState`](crate::state::AppState)
//! so tests can substitute a permissive or always-denying implementation
//! without touching the orchestration code.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use quill_domain::config::RateLimitConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Admission check for one turn. `key` is the device identifier.
pub trait RateLimiter: Send + Sync {
    /// Returns `true` if the turn may proceed, consuming one slot.
    fn allow(&self, key: &str) -> bool;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixed-window implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per device. A `None` config admits everything.
pub struct FixedWindowLimiter {
    config: Option<RateLimitConfig>,
    windows: RwLock<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(config: Option<RateLimitConfig>) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn allow(&self, key: &str) -> bool {
        let Some(cfg) = &self.config else {
            return true;
        };
        let window_len = Duration::from_secs(cfg.window_secs);
        let now = Instant::now();

        let mut windows = self.windows.write();
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= window_len {
            window.started = now;
            window.count = 0;
        }
        if window.count >= cfg.max_turns_per_window {
            return false;
        }
        window.count += 1;
        true
    }
}
