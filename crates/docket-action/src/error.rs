//! Error types for the action catalogue.

use docket_core::error::DocketError;

/// Errors from action lookup, candidate fetching and execution.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action failed: {0}")]
    Failed(String),
    #[error("Action not registered: {0}")]
    UnregisteredAction(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Candidate fetch failed: {0}")]
    CandidateFetch(String),
    #[error("Notification failed: {0}")]
    Notification(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DocketError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_display() {
        let err = ActionError::Failed("boom".to_string());
        assert_eq!(err.to_string(), "Action failed: boom");

        let err = ActionError::UnregisteredAction("CREATE_WIDGET".to_string());
        assert_eq!(err.to_string(), "Action not registered: CREATE_WIDGET");

        let err = ActionError::MissingField("name".to_string());
        assert_eq!(err.to_string(), "Missing field: name");

        let err = ActionError::CandidateFetch("teams table locked".to_string());
        assert_eq!(err.to_string(), "Candidate fetch failed: teams table locked");

        let err = ActionError::Notification("smtp down".to_string());
        assert_eq!(err.to_string(), "Notification failed: smtp down");
    }

    #[test]
    fn test_action_error_from_docket_error() {
        let storage_err = DocketError::Storage("disk full".to_string());
        let action_err: ActionError = storage_err.into();
        assert!(matches!(action_err, ActionError::Storage(_)));
        assert!(action_err.to_string().contains("disk full"));
    }
}
