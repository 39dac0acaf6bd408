//! Schema and result types for the action catalogue.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docket_core::types::AutoSource;

/// Values gathered for an action, keyed by field key.
///
/// `None` marks a field that was skipped or auto-skipped. Resolved fields
/// also carry a display entry under their kind's display key.
pub type CollectedFields = BTreeMap<String, Option<String>>;

/// Return the non-blank value stored under `key`.
pub fn field_value<'a>(fields: &'a CollectedFields, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(|v| v.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Collapse a free-text answer to `"yes"` or `"no"`.
///
/// Only `yes` and `y` (any case, surrounding whitespace ignored) are
/// affirmative.
pub fn normalize_boolean(value: Option<&str>) -> &'static str {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) if v == "yes" || v == "y" => "yes",
        _ => "no",
    }
}

/// Signature of a field validator: `Err` carries the human-readable reason.
pub type Validator = fn(&str) -> Result<(), String>;

/// Kinds of existing entity a field can be resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Team,
}

impl EntityKind {
    /// Key under which the chosen candidate's name is stored for display.
    pub fn display_key(&self) -> &'static str {
        match self {
            EntityKind::Category => "_categoryName",
            EntityKind::Team => "_teamName",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Category => write!(f, "category"),
            EntityKind::Team => write!(f, "team"),
        }
    }
}

/// When the candidates of a resolved field are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    /// Before any prompt, as soon as the flow starts. An empty candidate
    /// list aborts the flow.
    Upfront,
    /// When the cursor reaches the field, past the named field whether it
    /// was typed, auto-filled or skipped. An empty candidate list
    /// auto-skips the resolved field.
    AfterField(&'static str),
}

/// Binds a field to the entity resolution flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityBinding {
    pub kind: EntityKind,
    pub trigger: FetchTrigger,
}

/// Condition gating a field on an earlier answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependsOn {
    pub key: &'static str,
    /// Expected normalized value, `"yes"` or `"no"`.
    pub expected: &'static str,
}

/// One entry of an action's ordered field schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    /// Question for typed fields, selection header for resolved fields.
    pub prompt: &'static str,
    pub required: bool,
    pub auto_source: Option<AutoSource>,
    pub resolved: Option<EntityBinding>,
    pub depends_on: Option<DependsOn>,
    pub validate: Option<Validator>,
    pub default: Option<&'static str>,
}

impl FieldSpec {
    fn base(key: &'static str, label: &'static str, prompt: &'static str, required: bool) -> Self {
        Self {
            key,
            label,
            prompt,
            required,
            auto_source: None,
            resolved: None,
            depends_on: None,
            validate: None,
            default: None,
        }
    }

    /// A typed field that cannot be skipped.
    pub fn required(key: &'static str, label: &'static str, prompt: &'static str) -> Self {
        Self::base(key, label, prompt, true)
    }

    /// A typed field that may be skipped with an empty answer.
    pub fn optional(key: &'static str, label: &'static str, prompt: &'static str) -> Self {
        Self::base(key, label, prompt, false)
    }

    /// A field filled from the user's account, never asked.
    pub fn auto(key: &'static str, label: &'static str, source: AutoSource) -> Self {
        Self {
            auto_source: Some(source),
            ..Self::base(key, label, "", true)
        }
    }

    /// A field whose value is picked from a fetched candidate list.
    pub fn resolved(
        key: &'static str,
        label: &'static str,
        prompt: &'static str,
        required: bool,
        kind: EntityKind,
        trigger: FetchTrigger,
    ) -> Self {
        Self {
            resolved: Some(EntityBinding { kind, trigger }),
            ..Self::base(key, label, prompt, required)
        }
    }

    pub fn with_validator(mut self, validate: Validator) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn depends_on(mut self, key: &'static str, expected: &'static str) -> Self {
        self.depends_on = Some(DependsOn { key, expected });
        self
    }

    /// Value assumed when the field is skipped or unanswered. A field whose
    /// answer equals its default is left out of the confirmation summary.
    pub fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_auto(&self) -> bool {
        self.auto_source.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Run the validator, if any, on a non-empty answer.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self.validate {
            Some(validate) => validate(value),
            None => Ok(()),
        }
    }
}

/// An existing record a resolved field can point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub id: String,
    pub name: String,
}

impl EntityCandidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Outcome of running an action's business effect.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// The effect happened; the payload feeds `render_success`.
    Success(Value),
    /// The effect was refused or failed, with a user-facing reason.
    Failure(String),
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }
}

// ---- Shared validators ----

/// Reject blank answers with the given reason.
pub fn non_blank(value: &str, reason: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(reason.to_string())
    } else {
        Ok(())
    }
}

/// Accept yes/no/y/n in any case.
pub fn yes_or_no(value: &str) -> Result<(), String> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "no" | "y" | "n" => Ok(()),
        _ => Err("Please answer yes or no.".to_string()),
    }
}
