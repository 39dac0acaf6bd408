//! Session store adapter over the shared conversation context record.
//!
//! The session lives under [`SESSION_KEY`] inside a larger record that other
//! writers also use. `save` and `clear` read the whole record, touch only the
//! session key, and write it back, so sibling keys survive.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use docket_storage::{ContextStore, SESSION_KEY};

use crate::error::ChatError;
use crate::types::ConversationSession;

/// get/save/clear of one conversation's dialogue session.
pub struct AgentSessionStore {
    store: Arc<dyn ContextStore>,
}

impl AgentSessionStore {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self { store }
    }

    /// Load the session of a conversation, if a flow is in progress.
    ///
    /// A stored value that no longer deserializes is logged and treated as
    /// absent; the next `save` or `clear` overwrites it.
    pub async fn get(&self, conversation_id: &str) -> Result<Option<ConversationSession>, ChatError> {
        let Some(record) = self.store.load(conversation_id).await? else {
            return Ok(None);
        };
        match record.get(SESSION_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => match serde_json::from_value::<ConversationSession>(raw.clone()) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    warn!(conversation_id, error = %e, "Discarding malformed session");
                    Ok(None)
                }
            },
        }
    }

    /// Write the session, keeping every sibling key of the record.
    pub async fn save(
        &self,
        conversation_id: &str,
        session: &ConversationSession,
    ) -> Result<(), ChatError> {
        let value = serde_json::to_value(session).map_err(|e| ChatError::ParseError(e.to_string()))?;
        let mut record = self.store.load(conversation_id).await?.unwrap_or_default();
        record.insert(SESSION_KEY.to_string(), value);
        self.store.store(conversation_id, record).await?;
        debug!(conversation_id, state = session.state.name(), "Session saved");
        Ok(())
    }

    /// Remove the session, keeping every sibling key of the record.
    pub async fn clear(&self, conversation_id: &str) -> Result<(), ChatError> {
        let Some(mut record) = self.store.load(conversation_id).await? else {
            return Ok(());
        };
        if record.remove(SESSION_KEY).is_some() {
            self.store.store(conversation_id, record).await?;
            debug!(conversation_id, "Session cleared");
        }
        Ok(())
    }
}
