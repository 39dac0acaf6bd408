//! `CREATE_INTERNAL_TICKET`: raise a ticket under an existing category.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docket_core::types::{AutoSource, UserContext};
use docket_storage::{NewTicket, TicketRepository};

use super::{optional, require};
use crate::error::ActionError;
use crate::notify::Notifier;
use crate::registry::ActionDefinition;
use crate::types::{ActionResult, CollectedFields, EntityKind, FetchTrigger, FieldSpec};

const TICKET_ROLES: &[&str] = &["admin", "owner", "legal", "member"];

fn validate_description(value: &str) -> Result<(), String> {
    if value.trim().chars().count() >= 10 {
        Ok(())
    } else {
        Err("Description must be at least 10 characters.".to_string())
    }
}

pub struct CreateInternalTicket {
    repo: Arc<TicketRepository>,
    notifier: Arc<dyn Notifier>,
    schema: Vec<FieldSpec>,
}

impl CreateInternalTicket {
    pub fn new(repo: Arc<TicketRepository>, notifier: Arc<dyn Notifier>) -> Self {
        let schema = vec![
            FieldSpec::resolved(
                "categoryId",
                "Category",
                "Please select a category by name or number:",
                true,
                EntityKind::Category,
                FetchTrigger::Upfront,
            ),
            FieldSpec::required(
                "description",
                "Description",
                "Please describe the issue in detail.",
            )
            .with_validator(validate_description),
            FieldSpec::optional(
                "objective",
                "Objective",
                "What is the objective or expected outcome?",
            ),
            FieldSpec::optional("note", "Notes", "Any additional notes?"),
            FieldSpec::auto("name", "Your Name", AutoSource::Name),
            FieldSpec::auto("email", "Your Email", AutoSource::Email),
        ];
        Self {
            repo,
            notifier,
            schema,
        }
    }
}

#[async_trait]
impl ActionDefinition for CreateInternalTicket {
    fn id(&self) -> &'static str {
        "CREATE_INTERNAL_TICKET"
    }

    fn label(&self) -> &'static str {
        "raise an Internal Ticket"
    }

    fn field_schema(&self) -> &[FieldSpec] {
        &self.schema
    }

    fn allowed_roles(&self) -> Option<&[&'static str]> {
        Some(TICKET_ROLES)
    }

    async fn execute(
        &self,
        fields: &CollectedFields,
        user: &UserContext,
    ) -> Result<ActionResult, ActionError> {
        let category_id = require(fields, "categoryId")?;
        let description = require(fields, "description")?;
        let user_name = require(fields, "name")?;
        let email = require(fields, "email")?;

        let category = match self.repo.find_category(category_id)? {
            Some(c) if c.is_active && c.organization_id == user.organization_id => c,
            _ => return Ok(ActionResult::Failure("Invalid or inactive category".to_string())),
        };

        let ticket = self.repo.create_ticket(NewTicket {
            organization_id: category.organization_id.clone(),
            category_id: category.id.clone(),
            assigned_team_id: category.assigned_team_id.clone(),
            reviewer_id: category.reviewer_id.clone(),
            user_name: user_name.to_string(),
            email: email.to_string(),
            description: description.to_string(),
            objective: optional(fields, "objective"),
            note: optional(fields, "note"),
        })?;

        tracing::info!(ticket_id = %ticket.id, category = %category.name, "Internal ticket raised");

        if category.auto_reply_enabled {
            if let Some(message) = category
                .auto_reply_message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
            {
                self.repo.add_ticket_message(&ticket.id, message, true)?;
            }
        }

        if let Err(e) = self.notifier.ticket_created(&ticket, &category, user).await {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Ticket notification failed");
        }

        Ok(ActionResult::Success(json!({
            "ticketId": ticket.id,
            "workflowStatus": ticket.workflow_status,
        })))
    }

    fn render_success(&self, data: &Value) -> String {
        format!(
            "✅ Ticket raised!\n- **Ticket ID:** {}\n- **Status:** {}",
            data["ticketId"].as_str().unwrap_or_default(),
            data["workflowStatus"].as_str().unwrap_or_default(),
        )
    }
}
