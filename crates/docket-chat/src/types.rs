//! Session and response types for the dialogue engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docket_action::{CollectedFields, EntityCandidate};
use docket_core::types::{TokenUsage, UserContext};

/// Where an in-flight action flow currently is.
///
/// "No flow" is not a state: it is the absence of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogueState {
    /// Waiting for a typed answer to the field under the cursor.
    Collecting,
    /// Waiting for the user to pick one of `candidates` for `field`.
    AwaitingEntitySelection {
        field: String,
        #[serde(rename = "pendingCandidates")]
        candidates: Vec<EntityCandidate>,
    },
    /// Summary shown, waiting for yes/no.
    AwaitingConfirmation,
}

impl DialogueState {
    pub fn name(&self) -> &'static str {
        match self {
            DialogueState::Collecting => "collecting",
            DialogueState::AwaitingEntitySelection { .. } => "awaiting_entity_selection",
            DialogueState::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

/// One conversation's in-flight action flow, persisted between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub intent: String,
    pub collected_fields: CollectedFields,
    /// Cursor into the action's field schema. Never moves backwards.
    pub current_field_index: usize,
    pub state: DialogueState,
    /// Snapshot taken when the flow started.
    pub user_context: UserContext,
    pub started_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(intent: impl Into<String>, user_context: UserContext) -> Self {
        Self {
            intent: intent.into(),
            collected_fields: CollectedFields::new(),
            current_field_index: 0,
            state: DialogueState::Collecting,
            user_context,
            started_at: Utc::now(),
        }
    }

    /// Move the cursor past `index`, never backwards.
    pub fn advance_past(&mut self, index: usize) {
        self.current_field_index = self.current_field_index.max(index + 1);
    }

    pub fn set_field(&mut self, key: &str, value: Option<String>) {
        self.collected_fields.insert(key.to_string(), value);
    }
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Whether the reply belongs to an action flow.
    pub is_agent_flow: bool,
}

impl TurnResponse {
    /// A reply produced inside an action flow.
    pub fn agent(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            usage: None,
            is_agent_flow: true,
        }
    }

    /// A reply outside any action flow.
    pub fn plain(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            usage: None,
            is_agent_flow: false,
        }
    }
}
