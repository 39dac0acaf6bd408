//! Shared building blocks for the Docket ticketing assistant.
//!
//! Holds the workspace-wide error type, TOML configuration, and the small
//! value types (user context, token usage, chat history) that every other
//! crate passes around.

pub mod config;
pub mod error;
pub mod types;

pub use config::DocketConfig;
pub use error::{DocketError, Result};
pub use types::*;
