//! Built-in ticketing actions.

mod category;
mod internal_ticket;
mod request_form;

pub use category::CreateCategory;
pub use internal_ticket::CreateInternalTicket;
pub use request_form::CreateRequestForm;

use crate::error::ActionError;
use crate::types::{field_value, CollectedFields};

/// Roles allowed to manage forms and categories.
pub(crate) const MANAGER_ROLES: &[&str] = &["admin", "owner", "legal"];

/// Fetch a value the action cannot run without.
pub(crate) fn require<'a>(fields: &'a CollectedFields, key: &str) -> Result<&'a str, ActionError> {
    field_value(fields, key).ok_or_else(|| ActionError::MissingField(key.to_string()))
}

/// Fetch an optional value as an owned string.
pub(crate) fn optional(fields: &CollectedFields, key: &str) -> Option<String> {
    field_value(fields, key).map(str::to_string)
}
