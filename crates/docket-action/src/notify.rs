//! Best-effort notifications sent after a ticket is raised.

use async_trait::async_trait;

use docket_core::types::UserContext;
use docket_storage::{Category, Ticket};

use crate::error::ActionError;

/// Sends a confirmation once a ticket exists.
///
/// Callers treat failures as non-fatal: the ticket is already stored.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn ticket_created(
        &self,
        ticket: &Ticket,
        category: &Category,
        user: &UserContext,
    ) -> Result<(), ActionError>;
}

/// Notifier that only writes a log line.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn ticket_created(
        &self,
        ticket: &Ticket,
        category: &Category,
        user: &UserContext,
    ) -> Result<(), ActionError> {
        if ticket.email.trim().is_empty() {
            return Err(ActionError::Notification(format!(
                "no recipient for ticket {}",
                ticket.id
            )));
        }
        tracing::info!(
            ticket_id = %ticket.id,
            category = %category.name,
            recipient = %ticket.email,
            requested_by = %user.user_id,
            "Ticket confirmation sent"
        );
        Ok(())
    }
}
