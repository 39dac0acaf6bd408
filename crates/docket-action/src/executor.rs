//! Dispatches collected fields to the matching action.

use std::sync::Arc;

use docket_core::types::UserContext;

use crate::error::ActionError;
use crate::registry::ActionRegistry;
use crate::types::{ActionResult, CollectedFields};

/// Runs actions by intent id.
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    /// Execute the action registered under `intent`.
    ///
    /// Any error raised by the action itself is folded into
    /// [`ActionResult::Failure`]. Only an unregistered id is returned as
    /// `Err`, since that is a wiring bug rather than a user-facing failure.
    pub async fn execute(
        &self,
        intent: &str,
        fields: &CollectedFields,
        user: &UserContext,
    ) -> Result<ActionResult, ActionError> {
        let action = self
            .registry
            .get(intent)
            .ok_or_else(|| ActionError::UnregisteredAction(intent.to_string()))?;

        match action.execute(fields, user).await {
            Ok(result) => {
                tracing::info!(intent, success = result.is_success(), "Action executed");
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(intent, error = %e, "Action raised an error");
                Ok(ActionResult::Failure(e.to_string()))
            }
        }
    }
}
