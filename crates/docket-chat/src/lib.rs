//! Conversational interface for Docket.
//!
//! Drives schema-based action flows turn by turn: intent detection,
//! field-by-field collection with validation, entity selection against
//! live lists, confirmation and execution. Messages outside a flow are
//! answered by the general responder.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod session_store;
pub mod types;

pub use classifier::{IntentClassification, IntentClassifier, PatternClassifier, GENERAL_INTENT};
pub use engine::{next_field, DialogueEngine, EngineParts};
pub use error::ChatError;
pub use llm::{GeminiClient, GeneralReply, GeneralResponder, OfflineResponder};
pub use session_store::AgentSessionStore;
pub use types::{ConversationSession, DialogueState, TurnResponse};
