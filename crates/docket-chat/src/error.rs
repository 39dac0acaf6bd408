//! Error types for the dialogue engine.

use docket_action::ActionError;
use docket_core::error::DocketError;

/// Errors a turn can fail with.
///
/// User mistakes (bad answers, unknown candidates, missing permissions,
/// failed actions) are ordinary responses, not errors. Only infrastructure
/// failures end up here.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("action error: {0}")]
    ActionError(String),
    #[error("LLM error: {0}")]
    LlmError(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<DocketError> for ChatError {
    fn from(err: DocketError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

impl From<ActionError> for ChatError {
    fn from(err: ActionError) -> Self {
        ChatError::ActionError(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::LlmError(err.to_string())
    }
}
