//! Action definition trait and the registry of supported actions.
//!
//! Each action declares its ordered field schema, who may run it, and its
//! business effect. The dialogue engine only ever talks to actions through
//! [`ActionDefinition`], looked up by id in the [`ActionRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use docket_core::types::UserContext;
use docket_storage::TicketRepository;

use crate::definitions::{CreateCategory, CreateInternalTicket, CreateRequestForm};
use crate::error::ActionError;
use crate::notify::Notifier;
use crate::types::{ActionResult, CollectedFields, FieldSpec};

/// A supported action: schema, permissions and effect.
#[async_trait]
pub trait ActionDefinition: Send + Sync {
    /// Intent identifier, e.g. `CREATE_CATEGORY`.
    fn id(&self) -> &'static str;

    /// Phrase completing "I can help you ...".
    fn label(&self) -> &'static str;

    /// Phrase completing "You don't have permission to ...".
    fn denied_label(&self) -> &'static str {
        "perform this action"
    }

    /// Ordered fields collected before execution.
    fn field_schema(&self) -> &[FieldSpec];

    /// Roles allowed to start this action; `None` means unrestricted.
    fn allowed_roles(&self) -> Option<&[&'static str]> {
        None
    }

    /// Run the business effect with the collected fields.
    async fn execute(
        &self,
        fields: &CollectedFields,
        user: &UserContext,
    ) -> Result<ActionResult, ActionError>;

    /// Render the success payload of [`ActionResult::Success`].
    fn render_success(&self, data: &Value) -> String;
}

/// Whether `role` may start `action` (case-insensitive).
pub fn is_role_allowed(action: &dyn ActionDefinition, role: &str) -> bool {
    match action.allowed_roles() {
        None => true,
        Some(roles) => {
            let role = role.trim().to_lowercase();
            roles.iter().any(|r| r.to_lowercase() == role)
        }
    }
}

/// Registry mapping intent ids to action definitions.
pub struct ActionRegistry {
    actions: HashMap<&'static str, Arc<dyn ActionDefinition>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action, replacing any existing one with the same id.
    pub fn register(&mut self, action: Arc<dyn ActionDefinition>) {
        tracing::debug!(action = action.id(), "Registered action");
        self.actions.insert(action.id(), action);
    }

    /// Register the built-in ticketing actions.
    pub fn register_defaults(&mut self, repo: Arc<TicketRepository>, notifier: Arc<dyn Notifier>) {
        self.register(Arc::new(CreateRequestForm::new(Arc::clone(&repo))));
        self.register(Arc::new(CreateCategory::new(Arc::clone(&repo))));
        self.register(Arc::new(CreateInternalTicket::new(repo, notifier)));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ActionDefinition>> {
        self.actions.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.actions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
