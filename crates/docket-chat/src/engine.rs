//! Dialogue engine: the per-turn slot-filling state machine.
//!
//! Each turn loads the conversation's session, branches on its state,
//! consults the registry, resolver and executor as needed, writes the
//! session back and returns one response. Without a session the message
//! is classified; actionable intents start a flow, everything else goes to
//! the general responder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use docket_action::{
    is_role_allowed, normalize_boolean, resolve, ActionDefinition, ActionExecutor, ActionRegistry,
    ActionResult, CandidateSource, EntityCandidate, FetchTrigger, FieldSpec,
};
use docket_core::config::DialogueConfig;
use docket_core::types::{HistoryMessage, UserContext};
use docket_storage::{ContextRecord, ContextStore};

use crate::classifier::IntentClassifier;
use crate::error::ChatError;
use crate::llm::GeneralResponder;
use crate::prompts;
use crate::session_store::AgentSessionStore;
use crate::types::{ConversationSession, DialogueState, TurnResponse};

/// Collaborators the engine composes.
pub struct EngineParts {
    pub registry: Arc<ActionRegistry>,
    pub context_store: Arc<dyn ContextStore>,
    pub candidates: Arc<dyn CandidateSource>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub responder: Arc<dyn GeneralResponder>,
}

/// Turn-based orchestrator of action flows.
pub struct DialogueEngine {
    registry: Arc<ActionRegistry>,
    executor: ActionExecutor,
    sessions: AgentSessionStore,
    candidates: Arc<dyn CandidateSource>,
    classifier: Arc<dyn IntentClassifier>,
    responder: Arc<dyn GeneralResponder>,
    config: DialogueConfig,
    turn_locks: Mutex<TurnLocks>,
}

type TurnLocks = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

impl DialogueEngine {
    pub fn new(parts: EngineParts, config: DialogueConfig) -> Self {
        Self {
            executor: ActionExecutor::new(Arc::clone(&parts.registry)),
            registry: parts.registry,
            sessions: AgentSessionStore::new(parts.context_store),
            candidates: parts.candidates,
            classifier: parts.classifier,
            responder: parts.responder,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one inbound message and produce the reply.
    ///
    /// `history` is oldest first and includes `message` as its last entry;
    /// it and `context` are only used for general replies.
    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        message: &str,
        history: &[HistoryMessage],
        context: &ContextRecord,
        user: &UserContext,
    ) -> Result<TurnResponse, ChatError> {
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        if !self.config.serialize_turns {
            return self
                .run_turn(conversation_id, message, history, context, user)
                .await;
        }

        let slot = self.turn_slot(conversation_id)?;
        let _guard = slot.lock.lock().await;
        self.run_turn(conversation_id, message, history, context, user)
            .await
    }

    /// Number of conversations holding or waiting for a turn lock.
    pub fn active_turn_locks(&self) -> usize {
        self.turn_locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn turn_slot(&self, conversation_id: &str) -> Result<TurnSlot<'_>, ChatError> {
        let mut locks = self
            .turn_locks
            .lock()
            .map_err(|e| ChatError::StorageError(format!("turn lock poisoned: {}", e)))?;
        let lock = Arc::clone(locks.entry(conversation_id.to_string()).or_default());
        Ok(TurnSlot {
            locks: &self.turn_locks,
            conversation_id: conversation_id.to_string(),
            lock,
        })
    }

    async fn run_turn(
        &self,
        conversation_id: &str,
        message: &str,
        history: &[HistoryMessage],
        context: &ContextRecord,
        user: &UserContext,
    ) -> Result<TurnResponse, ChatError> {
        if let Some(session) = self.sessions.get(conversation_id).await? {
            if self.is_cancel(message) {
                self.sessions.clear(conversation_id).await?;
                info!(conversation_id, intent = %session.intent, "Flow cancelled");
                return Ok(TurnResponse::plain(prompts::CANCELLED));
            }

            match self.registry.get(&session.intent) {
                Some(action) => {
                    debug!(
                        conversation_id,
                        intent = %session.intent,
                        state = session.state.name(),
                        "Continuing flow"
                    );
                    return self
                        .continue_flow(conversation_id, message, action.as_ref(), session)
                        .await;
                }
                None => {
                    warn!(conversation_id, intent = %session.intent, "Dropping session for unregistered action");
                    self.sessions.clear(conversation_id).await?;
                }
            }
        }

        self.start_or_reply(conversation_id, message, history, context, user)
            .await
    }

    fn is_cancel(&self, message: &str) -> bool {
        let lowered = message.to_lowercase();
        self.config
            .cancel_keywords
            .iter()
            .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
    }

    // =========================================================================
    // No session
    // =========================================================================

    async fn start_or_reply(
        &self,
        conversation_id: &str,
        message: &str,
        history: &[HistoryMessage],
        context: &ContextRecord,
        user: &UserContext,
    ) -> Result<TurnResponse, ChatError> {
        let classification = self.classifier.classify(message).await?;
        debug!(
            conversation_id,
            intent = %classification.intent,
            confidence = classification.confidence,
            "Classified message"
        );

        if classification.is_actionable(self.config.confidence_threshold) {
            match self.registry.get(&classification.intent) {
                Some(action) => {
                    return self
                        .start_flow(conversation_id, action.as_ref(), user)
                        .await
                }
                None => {
                    warn!(conversation_id, intent = %classification.intent, "Classifier returned unknown intent")
                }
            }
        }

        let reply = self.responder.reply(history, context).await?;
        Ok(TurnResponse {
            response: reply.response,
            usage: reply.usage,
            is_agent_flow: false,
        })
    }

    async fn start_flow(
        &self,
        conversation_id: &str,
        action: &dyn ActionDefinition,
        user: &UserContext,
    ) -> Result<TurnResponse, ChatError> {
        if !is_role_allowed(action, &user.role) {
            info!(conversation_id, intent = action.id(), role = %user.role, "Role not permitted");
            return Ok(TurnResponse::plain(prompts::role_denied(action, &user.role)));
        }

        let mut session = ConversationSession::new(action.id(), user.clone());
        for field in action.field_schema() {
            if let Some(source) = field.auto_source {
                match user.value_of(source) {
                    Some(value) => session.set_field(field.key, Some(value.to_string())),
                    None => warn!(
                        conversation_id,
                        field = field.key,
                        source = %source,
                        "Missing user context value for auto field"
                    ),
                }
            }
        }

        let intro = prompts::intro(action, user);

        let upfront = action.field_schema().iter().find_map(|f| match f.resolved {
            Some(binding) if binding.trigger == FetchTrigger::Upfront => Some((f, binding)),
            _ => None,
        });
        if let Some((field, binding)) = upfront {
            let candidates = self
                .candidates
                .fetch_candidates(binding.kind, &user.organization_id)
                .await?;
            if candidates.is_empty() {
                info!(conversation_id, intent = action.id(), kind = %binding.kind, "No candidates, flow not started");
                return Ok(TurnResponse::agent(prompts::no_candidates(binding.kind)));
            }
            let body = prompts::selection_prompt(field, &candidates);
            session.state = DialogueState::AwaitingEntitySelection {
                field: field.key.to_string(),
                candidates,
            };
            self.sessions.save(conversation_id, &session).await?;
            info!(conversation_id, intent = action.id(), field = field.key, "Flow started");
            return Ok(TurnResponse::agent(prompts::with_prefix(Some(intro.as_str()), &body)));
        }

        info!(conversation_id, intent = action.id(), "Flow started");
        self.prompt_next(conversation_id, action, session, Some(intro.as_str()))
            .await
    }

    // =========================================================================
    // Session in progress
    // =========================================================================

    async fn continue_flow(
        &self,
        conversation_id: &str,
        message: &str,
        action: &dyn ActionDefinition,
        session: ConversationSession,
    ) -> Result<TurnResponse, ChatError> {
        match session.state.clone() {
            DialogueState::Collecting => self.collect(conversation_id, message, action, session).await,
            DialogueState::AwaitingEntitySelection { field, candidates } => {
                self.select(conversation_id, message, action, session, &field, &candidates)
                    .await
            }
            DialogueState::AwaitingConfirmation => self.confirm(conversation_id, message, action, session).await,
        }
    }

    async fn collect(
        &self,
        conversation_id: &str,
        message: &str,
        action: &dyn ActionDefinition,
        mut session: ConversationSession,
    ) -> Result<TurnResponse, ChatError> {
        let field = match next_field(action.field_schema(), &mut session) {
            Some(field) if !field.is_resolved() => field,
            _ => return self.prompt_next(conversation_id, action, session, None).await,
        };

        let value = message.trim();
        if value.is_empty() && field.required {
            return Ok(TurnResponse::agent(prompts::field_prompt(field)));
        }
        if !value.is_empty() {
            if let Err(reason) = field.check(value) {
                debug!(conversation_id, field = field.key, %reason, "Answer rejected");
                return Ok(TurnResponse::agent(prompts::validation_retry(field, &reason)));
            }
        }

        let stored = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        session.set_field(field.key, stored);
        let index = session.current_field_index;
        session.advance_past(index);
        debug!(conversation_id, field = field.key, "Field collected");

        self.prompt_next(conversation_id, action, session, None)
            .await
    }

    async fn select(
        &self,
        conversation_id: &str,
        message: &str,
        action: &dyn ActionDefinition,
        mut session: ConversationSession,
        field_key: &str,
        candidates: &[EntityCandidate],
    ) -> Result<TurnResponse, ChatError> {
        let schema = action.field_schema();
        let Some((index, field, binding)) =
            schema
                .iter()
                .enumerate()
                .find_map(|(i, f)| match f.resolved {
                    Some(b) if f.key == field_key => Some((i, f, b)),
                    _ => None,
                })
        else {
            warn!(conversation_id, field = field_key, "Awaited field is not resolvable, ending flow");
            self.sessions.clear(conversation_id).await?;
            return Ok(TurnResponse::plain(prompts::CANCELLED));
        };

        let input = message.trim();
        let notice = if input.is_empty() && !field.required {
            session.set_field(field.key, None);
            session.set_field(binding.kind.display_key(), None);
            prompts::selection_skipped(binding.kind)
        } else {
            match resolve(candidates, input) {
                Some(chosen) => {
                    session.set_field(field.key, Some(chosen.id.clone()));
                    session.set_field(binding.kind.display_key(), Some(chosen.name.clone()));
                    debug!(conversation_id, field = field.key, candidate = %chosen.id, "Entity selected");
                    prompts::selection_matched(binding.kind, &chosen.name)
                }
                None => {
                    return Ok(TurnResponse::agent(prompts::selection_retry(
                        field,
                        binding.kind,
                        candidates,
                    )))
                }
            }
        };

        session.advance_past(index);
        self.prompt_next(conversation_id, action, session, Some(notice.as_str()))
            .await
    }

    async fn confirm(
        &self,
        conversation_id: &str,
        message: &str,
        action: &dyn ActionDefinition,
        session: ConversationSession,
    ) -> Result<TurnResponse, ChatError> {
        if normalize_boolean(Some(message)) != "yes" {
            self.sessions.clear(conversation_id).await?;
            info!(conversation_id, intent = %session.intent, "Flow declined at confirmation");
            return Ok(TurnResponse::agent(prompts::DECLINED));
        }

        let outcome = self
            .executor
            .execute(&session.intent, &session.collected_fields, &session.user_context)
            .await;
        self.sessions.clear(conversation_id).await?;

        match outcome? {
            ActionResult::Success(data) => {
                info!(conversation_id, intent = %session.intent, "Flow completed");
                Ok(TurnResponse::agent(prompts::action_succeeded(
                    &action.render_success(&data),
                )))
            }
            ActionResult::Failure(error) => {
                info!(conversation_id, intent = %session.intent, %error, "Flow failed");
                Ok(TurnResponse::agent(prompts::action_failed(&error)))
            }
        }
    }

    /// Prompt the next due field, or show the summary when none is left.
    ///
    /// A due resolved field fetches its candidates and waits for a
    /// selection; with no candidates it is stored as null and the scan
    /// goes on. Nothing is saved if a fetch fails.
    async fn prompt_next(
        &self,
        conversation_id: &str,
        action: &dyn ActionDefinition,
        mut session: ConversationSession,
        prefix: Option<&str>,
    ) -> Result<TurnResponse, ChatError> {
        let schema = action.field_schema();
        let mut notices: Vec<String> = prefix.map(str::to_string).into_iter().collect();

        let body = loop {
            let Some(field) = next_field(schema, &mut session) else {
                session.state = DialogueState::AwaitingConfirmation;
                break prompts::confirmation_summary(
                    schema,
                    &session.collected_fields,
                    &session.user_context,
                );
            };
            let Some(binding) = field.resolved else {
                session.state = DialogueState::Collecting;
                break prompts::field_prompt(field);
            };

            let candidates = self
                .candidates
                .fetch_candidates(binding.kind, &session.user_context.organization_id)
                .await?;
            if candidates.is_empty() {
                info!(conversation_id, field = field.key, kind = %binding.kind, "No candidates, field skipped");
                session.set_field(field.key, None);
                session.set_field(binding.kind.display_key(), None);
                let index = session.current_field_index;
                session.advance_past(index);
                notices.push(prompts::candidates_auto_skipped(binding.kind));
                continue;
            }
            let body = prompts::selection_prompt(field, &candidates);
            session.state = DialogueState::AwaitingEntitySelection {
                field: field.key.to_string(),
                candidates,
            };
            break body;
        };

        self.sessions.save(conversation_id, &session).await?;
        debug!(conversation_id, state = session.state.name(), "Awaiting user");
        notices.push(body);
        Ok(TurnResponse::agent(notices.join("\n\n")))
    }
}

/// A conversation's turn lock, removed from the map when its last user
/// drops it (including when the turn future is cancelled).
struct TurnSlot<'a> {
    locks: &'a Mutex<TurnLocks>,
    conversation_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for TurnSlot<'_> {
    fn drop(&mut self) {
        let Ok(mut locks) = self.locks.lock() else {
            warn!(conversation_id = %self.conversation_id, "Turn lock map poisoned, entry kept");
            return;
        };
        // Clones are only taken under the map lock: one in the map plus
        // this one means nobody else holds or waits for it.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.conversation_id);
        }
    }
}

/// Find the next field to ask, starting at the session cursor.
///
/// Auto fields and upfront resolved fields are passed over (they are
/// filled when the flow starts). A resolved field fetched after another
/// field is returned once the cursor reaches it, whether its trigger was
/// typed, auto-filled or skipped. A field whose dependency does not hold
/// is stored as null and passed over. The cursor is left on the returned
/// field, or past the end.
pub fn next_field<'a>(
    schema: &'a [FieldSpec],
    session: &mut ConversationSession,
) -> Option<&'a FieldSpec> {
    while let Some(field) = schema.get(session.current_field_index) {
        let index = session.current_field_index;
        let upfront = field
            .resolved
            .is_some_and(|b| b.trigger == FetchTrigger::Upfront);
        if field.is_auto() || upfront {
            session.advance_past(index);
            continue;
        }
        if let Some(dep) = field.depends_on {
            let governing = session
                .collected_fields
                .get(dep.key)
                .and_then(|v| v.as_deref())
                .or_else(|| schema.iter().find(|f| f.key == dep.key).and_then(|f| f.default));
            if normalize_boolean(governing) != dep.expected {
                session.set_field(field.key, None);
                session.advance_past(index);
                continue;
            }
        }
        return Some(field);
    }
    None
}
