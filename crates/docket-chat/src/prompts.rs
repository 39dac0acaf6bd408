//! Rendering of every message the dialogue engine sends.
//!
//! All functions are pure: the same inputs always give the same text.

use docket_action::{
    format_list, ActionDefinition, CollectedFields, EntityCandidate, EntityKind, FieldSpec,
};
use docket_core::types::UserContext;

pub const CANCELLED: &str = "Cancelled! How else can I help you?";
pub const DECLINED: &str = "Alright, cancelled! Let me know if you'd like to start over.";
const FOLLOW_UP: &str = "Is there anything else I can help you with?";

/// Prompt for a typed field, tagged required/optional.
pub fn field_prompt(field: &FieldSpec) -> String {
    format!("{} {}", requirement_tag(field), field.prompt)
}

fn requirement_tag(field: &FieldSpec) -> &'static str {
    if field.required {
        "*(required)*"
    } else {
        "*(optional)*"
    }
}

/// Re-prompt after a validator rejected the answer.
pub fn validation_retry(field: &FieldSpec, reason: &str) -> String {
    format!("⚠️ {}\n\nPlease try again:\n{}", reason, field_prompt(field))
}

/// Opening message of a flow, ending with "Let's start!".
pub fn intro(action: &dyn ActionDefinition, user: &UserContext) -> String {
    let schema = action.field_schema();
    let asked: Vec<String> = schema
        .iter()
        .filter(|f| f.required && !f.is_auto() && !f.is_resolved())
        .map(|f| format!("• {}", f.label))
        .collect();
    let auto: Vec<String> = schema
        .iter()
        .filter_map(|f| {
            f.auto_source.map(|source| {
                format!("• {}: {}", f.label, user.value_of(source).unwrap_or("N/A"))
            })
        })
        .collect();

    let mut text = format!("Sure! I can help you {}.\n\n", action.label());
    if !asked.is_empty() {
        text.push_str(&format!("**I'll ask you for:**\n{}\n\n", asked.join("\n")));
    }
    if !auto.is_empty() {
        text.push_str(&format!(
            "**Auto-filled from your account:**\n{}\n\n",
            auto.join("\n")
        ));
    }
    text.push_str("Let's start!");
    text
}

/// Selection prompt for a resolved field.
pub fn selection_prompt(field: &FieldSpec, candidates: &[EntityCandidate]) -> String {
    format!("{}\n\n{}", field.prompt, format_list(candidates))
}

/// Re-prompt after the answer matched no candidate.
pub fn selection_retry(field: &FieldSpec, kind: EntityKind, candidates: &[EntityCandidate]) -> String {
    let skip_hint = if field.required {
        ""
    } else {
        " (or leave blank to skip)"
    };
    format!(
        "⚠️ Could not find that {}. Please pick by name or number{}:\n\n{}",
        kind,
        skip_hint,
        format_list(candidates)
    )
}

/// Acknowledge a resolved selection.
pub fn selection_matched(kind: EntityKind, name: &str) -> String {
    format!("Great! {} set to **{}**.", kind_title(kind), name)
}

/// Acknowledge skipping an optional selection.
pub fn selection_skipped(kind: EntityKind) -> String {
    format!("Skipped {} assignment.", kind)
}

/// Why a flow could not start: its upfront list is empty.
pub fn no_candidates(kind: EntityKind) -> String {
    match kind {
        EntityKind::Category => "⚠️ No active categories found for your organization. Please create a category first.".to_string(),
        EntityKind::Team => "⚠️ No teams found for your organization. Please create a team first.".to_string(),
    }
}

/// Notice that a dependent selection was skipped for lack of candidates.
pub fn candidates_auto_skipped(kind: EntityKind) -> String {
    match kind {
        EntityKind::Category => {
            "No active categories found in your organization, skipping category selection."
                .to_string()
        }
        EntityKind::Team => {
            "No teams found in your organization, skipping team assignment.".to_string()
        }
    }
}

fn kind_title(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Category => "Category",
        EntityKind::Team => "Team",
    }
}

/// Refusal when the user's role may not start the action.
pub fn role_denied(action: &dyn ActionDefinition, role: &str) -> String {
    let required = action
        .allowed_roles()
        .map(|roles| roles.join(", "))
        .unwrap_or_default();
    let role = if role.trim().is_empty() {
        "unknown"
    } else {
        role
    };
    format!(
        "🚫 **Access Denied**\n\nYou don't have permission to {}.\n\n- **Your role:** {}\n- **Required roles:** {}\n\nPlease contact your administrator if you need access.",
        action.denied_label(),
        role,
        required
    )
}

/// Summary shown before asking for confirmation.
///
/// Lists every non-auto field holding a value, with resolved fields shown
/// by their display name. Null fields, and fields still at their declared
/// default, are left out. Auto fields follow in their own block, read from
/// the user context.
pub fn confirmation_summary(
    schema: &[FieldSpec],
    fields: &CollectedFields,
    user: &UserContext,
) -> String {
    let mut lines = vec!["📋 **Summary before proceeding:**\n".to_string()];

    for field in schema.iter().filter(|f| !f.is_auto()) {
        let Some(value) = fields.get(field.key).and_then(|v| v.as_deref()) else {
            continue;
        };
        if field
            .default
            .is_some_and(|d| d.eq_ignore_ascii_case(value.trim()))
        {
            continue;
        }
        let shown = match field.resolved {
            Some(binding) => fields
                .get(binding.kind.display_key())
                .and_then(|v| v.as_deref())
                .unwrap_or(value),
            None => value,
        };
        lines.push(format!("- **{}:** {}", field.label, shown));
    }

    let auto: Vec<String> = schema
        .iter()
        .filter_map(|f| {
            let source = f.auto_source?;
            user.value_of(source)
                .map(|value| format!("- **{}:** {}", f.label, value))
        })
        .collect();
    if !auto.is_empty() {
        lines.push("\n🤖 **Auto-filled from your account:**".to_string());
        lines.extend(auto);
    }

    lines.push("\nShall I proceed? (yes/no)".to_string());
    lines.join("\n")
}

/// Reply after the action succeeded.
pub fn action_succeeded(rendered: &str) -> String {
    format!("{}\n\n{}", rendered, FOLLOW_UP)
}

/// Reply after the action failed.
pub fn action_failed(error: &str) -> String {
    format!("❌ Failed: {}\n\nWould you like to try again?", error)
}

/// Join an acknowledgement and the next prompt.
pub fn with_prefix(prefix: Option<&str>, body: &str) -> String {
    match prefix {
        Some(p) => format!("{}\n\n{}", p, body),
        None => body.to_string(),
    }
}
