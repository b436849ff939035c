//! Quill gateway: HTTP server, turn orchestration, and the terminal chat
//! client. The binary entrypoint lives in `main.rs`; everything here is
//! exported so integration tests can drive the runtime directly.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
