use quill_domain::trace::TraceEvent;

use crate::truncation::truncate_excerpt;

/// Separator between document excerpts in the assembled block.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// A document that survived store resolution (name + stored text).
pub struct SourceDocument {
    pub name: String,
    pub content: String,
}

/// The assembled grounding context for one turn.
#[derive(Debug, Clone, Default)]
pub struct GroundingBlock {
    /// Concatenated excerpts, empty when no documents were selected.
    pub text: String,
    /// Ordered names of the documents used (the "sources" side-channel).
    pub source_names: Vec<String>,
}

impl GroundingBlock {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Assemble a grounding block from resolved documents, in selection order.
///
/// Each excerpt is capped at `max_chars_per_document`, prefixed with a
/// `Document: <name>` header, and joined with a fixed separator. An empty
/// input yields an empty block — the prompt builder then omits the grounding
/// section entirely.
pub fn assemble(docs: &[SourceDocument], max_chars_per_document: usize) -> GroundingBlock {
    let mut blocks: Vec<String> = Vec::with_capacity(docs.len());
    let mut source_names: Vec<String> = Vec::with_capacity(docs.len());
    let mut truncated_count = 0usize;

    for doc in docs {
        let (excerpt, truncated) = truncate_excerpt(&doc.content, max_chars_per_document);
        if truncated {
            truncated_count += 1;
        }
        blocks.push(format!("Document: {}\n{}", doc.name, excerpt));
        source_names.push(doc.name.clone());
    }

    let text = blocks.join(BLOCK_SEPARATOR);

    TraceEvent::ContextAssembled {
        documents_requested: docs.len(),
        documents_included: source_names.len(),
        injected_chars: text.chars().count(),
        truncated: truncated_count,
    }
    .emit();

    GroundingBlock { text, source_names }
}
