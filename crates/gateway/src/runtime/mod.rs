//! Turn runtime: everything between "request accepted" and "assistant
//! turn persisted". The pieces are deliberately small and separately
//! testable — resolution, prompt assembly, persistence bracketing, rate
//! limiting, and the streaming turn loop that ties them together.

pub mod finalize;
pub mod limiter;
pub mod prompt;
pub mod resolver;
pub mod turn;
