//! Database schema migrations.
//!
//! Applies the initial schema: conversations (the opaque context blob),
//! teams, categories, request_forms, tickets and ticket_messages.

use rusqlite::Connection;
use tracing::info;

use docket_core::error::DocketError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), DocketError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DocketError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| DocketError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), DocketError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY NOT NULL,
            context     TEXT NOT NULL DEFAULT '{}',
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS teams (
            id              TEXT PRIMARY KEY NOT NULL,
            organization_id TEXT NOT NULL,
            name            TEXT NOT NULL,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_teams_org
            ON teams (organization_id, name);

        CREATE TABLE IF NOT EXISTS categories (
            id                  TEXT PRIMARY KEY NOT NULL,
            organization_id     TEXT NOT NULL,
            name                TEXT NOT NULL,
            assigned_team_id    TEXT REFERENCES teams (id),
            reviewer_id         TEXT,
            auto_reply_enabled  INTEGER NOT NULL DEFAULT 0,
            auto_reply_message  TEXT,
            created_by          TEXT NOT NULL,
            is_active           INTEGER NOT NULL DEFAULT 1,
            created_at          INTEGER NOT NULL,
            UNIQUE (organization_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_categories_org
            ON categories (organization_id, is_active, created_at DESC);

        CREATE TABLE IF NOT EXISTS request_forms (
            id                  TEXT PRIMARY KEY NOT NULL,
            organization_id     TEXT NOT NULL,
            name                TEXT NOT NULL,
            slug                TEXT NOT NULL UNIQUE,
            description         TEXT,
            tags                TEXT NOT NULL DEFAULT '[]',
            auto_reply_enabled  INTEGER NOT NULL DEFAULT 0,
            auto_reply_message  TEXT,
            created_by          TEXT NOT NULL,
            created_at          INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tickets (
            id                  TEXT PRIMARY KEY NOT NULL,
            organization_id     TEXT NOT NULL,
            category_id         TEXT NOT NULL REFERENCES categories (id),
            assigned_team_id    TEXT,
            reviewer_id         TEXT,
            user_name           TEXT NOT NULL,
            email               TEXT NOT NULL,
            description         TEXT NOT NULL,
            objective           TEXT,
            note                TEXT,
            workflow_status     TEXT NOT NULL DEFAULT 'OPEN',
            reviewed            INTEGER NOT NULL DEFAULT 0,
            created_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_category
            ON tickets (category_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS ticket_messages (
            id              TEXT PRIMARY KEY NOT NULL,
            ticket_id       TEXT NOT NULL REFERENCES tickets (id) ON DELETE CASCADE,
            content         TEXT NOT NULL,
            is_auto_reply   INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| DocketError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
