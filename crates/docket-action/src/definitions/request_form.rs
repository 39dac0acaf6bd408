//! `CREATE_REQUEST_FORM`: publish a public intake form.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docket_core::types::{AutoSource, UserContext};
use docket_storage::{NewRequestForm, TicketRepository};

use super::{optional, require, MANAGER_ROLES};
use crate::error::ActionError;
use crate::registry::ActionDefinition;
use crate::types::{
    field_value, non_blank, normalize_boolean, yes_or_no, ActionResult, CollectedFields, FieldSpec,
};

pub struct CreateRequestForm {
    repo: Arc<TicketRepository>,
    schema: Vec<FieldSpec>,
}

impl CreateRequestForm {
    pub fn new(repo: Arc<TicketRepository>) -> Self {
        let schema = vec![
            FieldSpec::required(
                "name",
                "Form Name",
                "What would you like to name this request form?",
            )
            .with_validator(|v| non_blank(v, "Form name cannot be empty.")),
            FieldSpec::optional(
                "tags",
                "Tags",
                "Add tags for this form? (comma-separated e.g: legal, NDA, contract)",
            ),
            FieldSpec::optional(
                "description",
                "Description",
                "Provide a description for this form?",
            ),
            FieldSpec::optional(
                "autoReplyEnabled",
                "Auto Reply",
                "Enable auto-reply for submissions? (yes/no)",
            )
            .with_validator(yes_or_no)
            .with_default("no"),
            FieldSpec::optional(
                "autoReplyMessage",
                "Auto Reply Message",
                "What should the auto-reply message say?",
            )
            .depends_on("autoReplyEnabled", "yes"),
            FieldSpec::auto("organization", "Organization", AutoSource::OrganizationId),
            FieldSpec::auto("createdBy", "Created By", AutoSource::UserId),
        ];
        Self { repo, schema }
    }

    /// First free slug among `base`, `base-1`, `base-2`, ...
    fn unique_slug(&self, name: &str) -> Result<String, ActionError> {
        let base = slugify(name);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.repo.slug_exists(&candidate)? {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        Ok(candidate)
    }
}

/// Lowercase alphanumerics joined by single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("form");
    }
    slug
}

/// Split a comma-separated answer into trimmed, non-empty tags.
fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[async_trait]
impl ActionDefinition for CreateRequestForm {
    fn id(&self) -> &'static str {
        "CREATE_REQUEST_FORM"
    }

    fn label(&self) -> &'static str {
        "create a Request Form"
    }

    fn denied_label(&self) -> &'static str {
        "create Request Forms"
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
        let organization_id = require(fields, "organization")?;
        let created_by = require(fields, "createdBy")?;

        let auto_reply_enabled = normalize_boolean(field_value(fields, "autoReplyEnabled")) == "yes";
        let auto_reply_message = if auto_reply_enabled {
            optional(fields, "autoReplyMessage")
        } else {
            None
        };

        let slug = self.unique_slug(name)?;
        let form = self.repo.create_request_form(NewRequestForm {
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            slug,
            description: optional(fields, "description"),
            tags: split_tags(field_value(fields, "tags")),
            auto_reply_enabled,
            auto_reply_message,
            created_by: created_by.to_string(),
        })?;

        tracing::info!(form_id = %form.id, slug = %form.slug, "Request form created");

        Ok(ActionResult::Success(json!({
            "id": form.id,
            "name": form.name,
            "slug": form.slug,
            "publicUrl": format!("/request/{}", form.slug),
        })))
    }

    fn render_success(&self, data: &Value) -> String {
        format!(
            "✅ Request Form created!\n- **Name:** {}\n- **Slug:** {}\n- **Public URL:** {}",
            data["name"].as_str().unwrap_or_default(),
            data["slug"].as_str().unwrap_or_default(),
            data["publicUrl"].as_str().unwrap_or_default(),
        )
    }
}
