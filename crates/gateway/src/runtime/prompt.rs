//! Builds the ordered prompt for one turn: a single system instruction
//! (persona + optional grounding + formatting contract) followed by the
//! client-supplied history in its original order.

use quill_contextpack::GroundingBlock;
use quill_domain::config::PersonaConfig;
use quill_providers::PromptMessage;

/// Preamble that introduces the grounding block inside the system message.
const GROUNDING_HEADER: &str = "Reference documents:";

/// Assemble the complete message list for a turn.
///
/// `history` is the client's prior turns plus the new user message, already
/// in chronological order; it is passed through untouched. The system
/// instruction is always the single first entry.
pub fn build_messages(
    persona: &PersonaConfig,
    grounding: &GroundingBlock,
    history: Vec<PromptMessage>,
) -> Vec<PromptMessage> {
    let mut system = String::with_capacity(
        persona.system_text.len() + grounding.text.len() + 128,
    );
    system.push_str(&persona.system_text);
    if !grounding.is_empty() {
        system.push_str("\n\n");
        system.push_str(GROUNDING_HEADER);
        system.push_str("\n\n");
        system.push_str(&grounding.text);
    }
    system.push_str("\n\n");
    system.push_str(persona.format.contract());

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(PromptMessage::system(system));
    messages.extend(history);
    messages
}
