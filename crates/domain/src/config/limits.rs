use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Wall-clock ceiling for one full turn (generation + streaming), in
    /// seconds. Exceeding it surfaces as a terminal error rather than a hang.
    #[serde(default = "d_turn_timeout")]
    pub turn_timeout_secs: u64,
    /// Per-device fixed-window rate limiting. `None` disables limiting —
    /// suitable for local development.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: d_turn_timeout(),
            rate_limit: None,
        }
    }
}

/// Per-device fixed-window rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum turns a single device may submit per window.
    pub max_turns_per_window: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

fn d_turn_timeout() -> u64 {
    120
}
