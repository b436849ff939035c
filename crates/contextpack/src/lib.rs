//! Deterministic grounding-context assembly.
//!
//! Pure functions: the caller resolves document identifiers against the
//! store and passes the surviving name/content pairs here; this crate only
//! clips, labels, and joins them.

mod assembler;
mod truncation;

pub use assembler::{assemble, GroundingBlock, SourceDocument};
pub use truncation::{truncate_excerpt, TRUNCATION_MARKER};
