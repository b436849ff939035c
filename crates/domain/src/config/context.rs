use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Grounding context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Per-document excerpt cap in characters. Excess text is clipped and
    /// marked with a truncation marker.
    #[serde(default = "d_max_chars")]
    pub max_chars_per_document: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars_per_document: d_max_chars(),
        }
    }
}

fn d_max_chars() -> usize {
    10_000
}
