pub mod config;
pub mod error;
pub mod id;
pub mod stream;
pub mod trace;

pub use error::{Error, Result};
