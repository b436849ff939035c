use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persona & formatting contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The formatting contract appended to the system instruction.
///
/// This is plain instruction text, not a structural constraint on the
/// endpoint — downstream decoding must not assume it is obeyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatPolicy {
    /// "Respond in plain text only."
    #[default]
    PlainText,
    /// "Use headings and bold for structure."
    Markdown,
}

impl FormatPolicy {
    pub fn contract(self) -> &'static str {
        match self {
            FormatPolicy::PlainText => {
                "Respond in plain text only. Do not use markdown formatting."
            }
            FormatPolicy::Markdown => {
                "Structure long answers with markdown headings and bold text."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// System instruction describing the assistant's persona.
    #[serde(default = "d_system_text")]
    pub system_text: String,
    #[serde(default)]
    pub format: FormatPolicy,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_text: d_system_text(),
            format: FormatPolicy::default(),
        }
    }
}

fn d_system_text() -> String {
    "You are a helpful assistant. When reference documents are provided, \
     ground your answers in them and say so when they do not cover the \
     question."
        .into()
}
