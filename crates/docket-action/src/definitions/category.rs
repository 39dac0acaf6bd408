//! `CREATE_CATEGORY`: add an internal-ticket category.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docket_core::types::{AutoSource, UserContext};
use docket_storage::{NewCategory, TicketRepository};

use super::{optional, require, MANAGER_ROLES};
use crate::error::ActionError;
use crate::registry::ActionDefinition;
use crate::types::{
    field_value, non_blank, normalize_boolean, yes_or_no, ActionResult, CollectedFields,
    EntityKind, FetchTrigger, FieldSpec,
};

pub struct CreateCategory {
    repo: Arc<TicketRepository>,
    schema: Vec<FieldSpec>,
}

impl CreateCategory {
    pub fn new(repo: Arc<TicketRepository>) -> Self {
        let schema = vec![
            FieldSpec::required("name", "Category Name", "What is the name of this category?")
                .with_validator(|v| non_blank(v, "Category name cannot be empty.")),
            FieldSpec::resolved(
                "assignedTeamId",
                "Assigned Team",
                "Please select a team to assign this category to (can not be skipped):",
                true,
                EntityKind::Team,
                FetchTrigger::AfterField("name"),
            ),
            FieldSpec::optional(
                "autoReplyEnabled",
                "Auto Reply",
                "Enable auto-reply for this category? (yes/no)",
            )
            .with_validator(yes_or_no)
            .with_default("no"),
            FieldSpec::optional(
                "autoReplyMessage",
                "Auto Reply Message",
                "What should the auto-reply message say?",
            )
            .depends_on("autoReplyEnabled", "yes"),
            FieldSpec::auto("organizationId", "Organization", AutoSource::OrganizationId),
            FieldSpec::auto("createdBy", "Created By", AutoSource::UserId),
        ];
        Self { repo, schema }
    }
}

#[async_trait]
impl ActionDefinition for CreateCategory {
    fn id(&self) -> &'static str {
        "CREATE_CATEGORY"
    }

    fn label(&self) -> &'static str {
        "create a Category"
    }

    fn denied_label(&self) -> &'static str {
        "create Categories"
    }

    fn field_schema(&self) -> &[FieldSpec] {
        &self.schema
    }

    fn allowed_roles(&self) -> Option<&[&'static str]> {
        Some(MANAGER_ROLES)
    }

    async fn execute(
        &self,
        fields: &CollectedFields,
        _user: &UserContext,
    ) -> Result<ActionResult, ActionError> {
        let name = require(fields, "name")?;
        let organization_id = require(fields, "organizationId")?;
        let created_by = require(fields, "createdBy")?;

        if self
            .repo
            .find_category_by_name(organization_id, name)?
            .is_some()
        {
            return Ok(ActionResult::Failure(
                "Category with this name already exists in the organization".to_string(),
            ));
        }

        // The team step is auto-skipped for organizations without teams.
        let assigned_team_id = match field_value(fields, "assignedTeamId") {
            Some(team_id) => match self.repo.find_team(team_id)? {
                Some(team) if team.organization_id == organization_id => Some(team.id),
                _ => {
                    return Ok(ActionResult::Failure(
                        "Assigned team does not belong to this organization".to_string(),
                    ))
                }
            },
            None => None,
        };

        let auto_reply_enabled = normalize_boolean(field_value(fields, "autoReplyEnabled")) == "yes";
        let auto_reply_message = if auto_reply_enabled {
            optional(fields, "autoReplyMessage")
        } else {
            None
        };

        let category = self.repo.create_category(NewCategory {
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            assigned_team_id,
            auto_reply_enabled,
            auto_reply_message,
            created_by: created_by.to_string(),
        })?;

        tracing::info!(category_id = %category.id, "Category created");

        Ok(ActionResult::Success(json!({
            "id": category.id,
            "name": category.name,
            "assignedTeamId": category.assigned_team_id,
        })))
    }

    fn render_success(&self, data: &Value) -> String {
        format!(
            "✅ Category created!\n- **Name:** {}\n- **ID:** {}",
            data["name"].as_str().unwrap_or_default(),
            data["id"].as_str().unwrap_or_default(),
        )
    }
}
