//! Ticketing repository over the SQLite database.
//!
//! Teams, categories, request forms, tickets and ticket messages. Business
//! rules (duplicate names, slug uniqueness, team ownership) live in the
//! actions that call this repository; here there is only raw SQL.

use std::sync::Arc;

use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docket_core::error::DocketError;
use docket_core::types::Timestamp;

use crate::db::Database;

/// A team inside an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at: Timestamp,
}

/// An internal-ticket category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub assigned_team_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
    pub created_by: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// Fields for inserting a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub organization_id: String,
    pub name: String,
    pub assigned_team_id: Option<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
    pub created_by: String,
}

/// A public request form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestForm {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
    pub created_by: String,
    pub created_at: Timestamp,
}

/// Fields for inserting a request form.
#[derive(Debug, Clone)]
pub struct NewRequestForm {
    pub organization_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_message: Option<String>,
    pub created_by: String,
}

/// An internal ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub organization_id: String,
    pub category_id: String,
    pub assigned_team_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub user_name: String,
    pub email: String,
    pub description: String,
    pub objective: Option<String>,
    pub note: Option<String>,
    pub workflow_status: String,
    pub created_at: Timestamp,
}

/// Fields for inserting a ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub organization_id: String,
    pub category_id: String,
    pub assigned_team_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub user_name: String,
    pub email: String,
    pub description: String,
    pub objective: Option<String>,
    pub note: Option<String>,
}

/// A message posted on a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMessage {
    pub id: String,
    pub ticket_id: String,
    pub content: String,
    pub is_auto_reply: bool,
    pub created_at: Timestamp,
}

const CATEGORY_COLUMNS: &str = "id, organization_id, name, assigned_team_id, reviewer_id,
     auto_reply_enabled, auto_reply_message, created_by, is_active, created_at";

/// Repository for the ticketing tables.
pub struct TicketRepository {
    db: Arc<Database>,
}

impl TicketRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // -- Teams --

    /// Create a team.
    pub fn create_team(&self, organization_id: &str, name: &str) -> Result<Team, DocketError> {
        let team = Team {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            created_at: Timestamp::now(),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO teams (id, organization_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![team.id, team.organization_id, team.name, team.created_at.0],
            )
            .map_err(|e| DocketError::Storage(format!("Failed to create team: {}", e)))?;
            Ok(())
        })?;
        Ok(team)
    }

    /// List an organization's teams, alphabetically.
    pub fn list_teams(&self, organization_id: &str) -> Result<Vec<Team>, DocketError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, organization_id, name, created_at FROM teams
                     WHERE organization_id = ?1
                     ORDER BY name ASC",
                )
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![organization_id], row_to_team)
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            collect_rows(rows)
        })
    }

    /// Find a team by ID.
    pub fn find_team(&self, id: &str) -> Result<Option<Team>, DocketError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, organization_id, name, created_at FROM teams WHERE id = ?1",
                rusqlite::params![id],
                row_to_team,
            )
            .optional()
            .map_err(|e| DocketError::Storage(e.to_string()))
        })
    }

    // -- Categories --

    /// Insert an active category.
    pub fn create_category(&self, new: NewCategory) -> Result<Category, DocketError> {
        let category = Category {
            id: Uuid::new_v4().to_string(),
            organization_id: new.organization_id,
            name: new.name,
            assigned_team_id: new.assigned_team_id,
            reviewer_id: None,
            auto_reply_enabled: new.auto_reply_enabled,
            auto_reply_message: new.auto_reply_message,
            created_by: new.created_by,
            is_active: true,
            created_at: Timestamp::now(),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO categories ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    CATEGORY_COLUMNS
                ),
                rusqlite::params![
                    category.id,
                    category.organization_id,
                    category.name,
                    category.assigned_team_id,
                    category.reviewer_id,
                    category.auto_reply_enabled as i32,
                    category.auto_reply_message,
                    category.created_by,
                    category.is_active as i32,
                    category.created_at.0,
                ],
            )
            .map_err(|e| DocketError::Storage(format!("Failed to create category: {}", e)))?;
            Ok(())
        })?;
        Ok(category)
    }

    /// Find a category by ID, active or not.
    pub fn find_category(&self, id: &str) -> Result<Option<Category>, DocketError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS),
                rusqlite::params![id],
                row_to_category,
            )
            .optional()
            .map_err(|e| DocketError::Storage(e.to_string()))
        })
    }

    /// Find a category by exact name within an organization.
    pub fn find_category_by_name(
        &self,
        organization_id: &str,
        name: &str,
    ) -> Result<Option<Category>, DocketError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM categories WHERE organization_id = ?1 AND name = ?2",
                    CATEGORY_COLUMNS
                ),
                rusqlite::params![organization_id, name],
                row_to_category,
            )
            .optional()
            .map_err(|e| DocketError::Storage(e.to_string()))
        })
    }

    /// List an organization's active categories, newest first.
    pub fn list_active_categories(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Category>, DocketError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM categories
                     WHERE organization_id = ?1 AND is_active = 1
                     ORDER BY created_at DESC, rowid DESC",
                    CATEGORY_COLUMNS
                ))
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![organization_id], row_to_category)
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            collect_rows(rows)
        })
    }

    /// Activate or deactivate a category.
    pub fn set_category_active(&self, id: &str, active: bool) -> Result<(), DocketError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE categories SET is_active = ?2 WHERE id = ?1",
                    rusqlite::params![id, active as i32],
                )
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            if changed == 0 {
                return Err(DocketError::NotFound(format!("category {}", id)));
            }
            Ok(())
        })
    }

    // -- Request forms --

    /// Whether any request form already uses `slug`.
    pub fn slug_exists(&self, slug: &str) -> Result<bool, DocketError> {
        self.db.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM request_forms WHERE slug = ?1",
                    rusqlite::params![slug],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            Ok(found.is_some())
        })
    }

    /// Insert a request form.
    pub fn create_request_form(&self, new: NewRequestForm) -> Result<RequestForm, DocketError> {
        let form = RequestForm {
            id: Uuid::new_v4().to_string(),
            organization_id: new.organization_id,
            name: new.name,
            slug: new.slug,
            description: new.description,
            tags: new.tags,
            auto_reply_enabled: new.auto_reply_enabled,
            auto_reply_message: new.auto_reply_message,
            created_by: new.created_by,
            created_at: Timestamp::now(),
        };
        let tags = serde_json::to_string(&form.tags)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO request_forms (id, organization_id, name, slug, description, tags,
                    auto_reply_enabled, auto_reply_message, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    form.id,
                    form.organization_id,
                    form.name,
                    form.slug,
                    form.description,
                    tags,
                    form.auto_reply_enabled as i32,
                    form.auto_reply_message,
                    form.created_by,
                    form.created_at.0,
                ],
            )
            .map_err(|e| DocketError::Storage(format!("Failed to create request form: {}", e)))?;
            Ok(())
        })?;
        Ok(form)
    }

    // -- Tickets --

    /// Insert an OPEN ticket.
    pub fn create_ticket(&self, new: NewTicket) -> Result<Ticket, DocketError> {
        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            organization_id: new.organization_id,
            category_id: new.category_id,
            assigned_team_id: new.assigned_team_id,
            reviewer_id: new.reviewer_id,
            user_name: new.user_name,
            email: new.email,
            description: new.description,
            objective: new.objective,
            note: new.note,
            workflow_status: "OPEN".to_string(),
            created_at: Timestamp::now(),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tickets (id, organization_id, category_id, assigned_team_id,
                    reviewer_id, user_name, email, description, objective, note,
                    workflow_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    ticket.id,
                    ticket.organization_id,
                    ticket.category_id,
                    ticket.assigned_team_id,
                    ticket.reviewer_id,
                    ticket.user_name,
                    ticket.email,
                    ticket.description,
                    ticket.objective,
                    ticket.note,
                    ticket.workflow_status,
                    ticket.created_at.0,
                ],
            )
            .map_err(|e| DocketError::Storage(format!("Failed to create ticket: {}", e)))?;
            Ok(())
        })?;
        Ok(ticket)
    }

    /// List an organization's tickets, newest first.
    pub fn list_tickets(&self, organization_id: &str) -> Result<Vec<Ticket>, DocketError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, organization_id, category_id, assigned_team_id, reviewer_id,
                            user_name, email, description, objective, note, workflow_status,
                            created_at
                     FROM tickets WHERE organization_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![organization_id], row_to_ticket)
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            collect_rows(rows)
        })
    }

    /// Post a message on a ticket.
    pub fn add_ticket_message(
        &self,
        ticket_id: &str,
        content: &str,
        is_auto_reply: bool,
    ) -> Result<TicketMessage, DocketError> {
        let message = TicketMessage {
            id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            content: content.to_string(),
            is_auto_reply,
            created_at: Timestamp::now(),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO ticket_messages (id, ticket_id, content, is_auto_reply, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id,
                    message.ticket_id,
                    message.content,
                    message.is_auto_reply as i32,
                    message.created_at.0,
                ],
            )
            .map_err(|e| DocketError::Storage(format!("Failed to add ticket message: {}", e)))?;
            Ok(())
        })?;
        Ok(message)
    }

    /// List the messages of a ticket in posting order.
    pub fn list_ticket_messages(&self, ticket_id: &str) -> Result<Vec<TicketMessage>, DocketError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, ticket_id, content, is_auto_reply, created_at
                     FROM ticket_messages WHERE ticket_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![ticket_id], |row| {
                    Ok(TicketMessage {
                        id: row.get(0)?,
                        ticket_id: row.get(1)?,
                        content: row.get(2)?,
                        is_auto_reply: row.get::<_, i32>(3)? != 0,
                        created_at: Timestamp(row.get(4)?),
                    })
                })
                .map_err(|e| DocketError::Storage(e.to_string()))?;
            collect_rows(rows)
        })
    }
}

// -- Row mapping --

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, DocketError> {
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .map_err(|e| DocketError::Storage(e.to_string()))
}

fn row_to_team(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        created_at: Timestamp(row.get(3)?),
    })
}

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        assigned_team_id: row.get(3)?,
        reviewer_id: row.get(4)?,
        auto_reply_enabled: row.get::<_, i32>(5)? != 0,
        auto_reply_message: row.get(6)?,
        created_by: row.get(7)?,
        is_active: row.get::<_, i32>(8)? != 0,
        created_at: Timestamp(row.get(9)?),
    })
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        category_id: row.get(2)?,
        assigned_team_id: row.get(3)?,
        reviewer_id: row.get(4)?,
        user_name: row.get(5)?,
        email: row.get(6)?,
        description: row.get(7)?,
        objective: row.get(8)?,
        note: row.get(9)?,
        workflow_status: row.get(10)?,
        created_at: Timestamp(row.get(11)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> TicketRepository {
        TicketRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn new_category(org: &str, name: &str, team: Option<String>) -> NewCategory {
        NewCategory {
            organization_id: org.to_string(),
            name: name.to_string(),
            assigned_team_id: team,
            auto_reply_enabled: false,
            auto_reply_message: None,
            created_by: "u-1".to_string(),
        }
    }

    #[test]
    fn test_teams_sorted_and_scoped() {
        let repo = repo();
        repo.create_team("org-a", "Legal Team").unwrap();
        repo.create_team("org-a", "Compliance Team").unwrap();
        repo.create_team("org-b", "HR Team").unwrap();

        let teams = repo.list_teams("org-a").unwrap();
        let names: Vec<&str> = teams.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Compliance Team", "Legal Team"]);
    }

    #[test]
    fn test_find_team() {
        let repo = repo();
        let team = repo.create_team("org-a", "Legal Team").unwrap();
        assert_eq!(repo.find_team(&team.id).unwrap(), Some(team));
        assert!(repo.find_team("missing").unwrap().is_none());
    }

    #[test]
    fn test_category_roundtrip() {
        let repo = repo();
        let team = repo.create_team("org-a", "Legal Team").unwrap();
        let created = repo
            .create_category(new_category("org-a", "NDA", Some(team.id.clone())))
            .unwrap();

        let found = repo.find_category(&created.id).unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.assigned_team_id, Some(team.id));
        assert!(found.is_active);

        let by_name = repo.find_category_by_name("org-a", "NDA").unwrap();
        assert_eq!(by_name.map(|c| c.id), Some(created.id));
        assert!(repo.find_category_by_name("org-b", "NDA").unwrap().is_none());
    }

    #[test]
    fn test_active_categories_newest_first_and_filtered() {
        let repo = repo();
        let first = repo.create_category(new_category("org-a", "First", None)).unwrap();
        let second = repo.create_category(new_category("org-a", "Second", None)).unwrap();
        let third = repo.create_category(new_category("org-a", "Third", None)).unwrap();
        repo.set_category_active(&second.id, false).unwrap();

        let ids: Vec<String> = repo
            .list_active_categories("org-a")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![third.id, first.id]);
    }

    #[test]
    fn test_set_category_active_missing() {
        let repo = repo();
        assert!(matches!(
            repo.set_category_active("missing", false),
            Err(DocketError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_form_slug_lookup() {
        let repo = repo();
        assert!(!repo.slug_exists("nda-intake").unwrap());
        let form = repo
            .create_request_form(NewRequestForm {
                organization_id: "org-a".to_string(),
                name: "NDA Intake".to_string(),
                slug: "nda-intake".to_string(),
                description: None,
                tags: vec!["legal".to_string(), "nda".to_string()],
                auto_reply_enabled: false,
                auto_reply_message: None,
                created_by: "u-1".to_string(),
            })
            .unwrap();
        assert_eq!(form.tags.len(), 2);
        assert!(repo.slug_exists("nda-intake").unwrap());
    }

    #[test]
    fn test_ticket_and_messages() {
        let repo = repo();
        let category = repo.create_category(new_category("org-a", "NDA", None)).unwrap();
        let ticket = repo
            .create_ticket(NewTicket {
                organization_id: "org-a".to_string(),
                category_id: category.id.clone(),
                assigned_team_id: None,
                reviewer_id: None,
                user_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                description: "Review the NDA before signing".to_string(),
                objective: None,
                note: Some("urgent".to_string()),
            })
            .unwrap();
        assert_eq!(ticket.workflow_status, "OPEN");

        repo.add_ticket_message(&ticket.id, "Thanks, we got it.", true)
            .unwrap();
        let messages = repo.list_ticket_messages(&ticket.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_auto_reply);

        let tickets = repo.list_tickets("org-a").unwrap();
        assert_eq!(tickets, vec![ticket]);
    }
}
