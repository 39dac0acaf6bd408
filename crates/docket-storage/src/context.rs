//! Per-conversation context records.
//!
//! Each conversation owns one opaque JSON object. Several writers share it:
//! the dialogue session lives under [`SESSION_KEY`], while callers may keep
//! arbitrary sibling keys (user identity, inferred topic metadata). Stores
//! only read and write whole records; there is no compare-and-swap, so two
//! concurrent writers of the same conversation race under last-write-wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use serde_json::{Map, Value};
use tracing::debug;

use docket_core::error::DocketError;
use docket_core::types::Timestamp;

use crate::db::Database;

/// Key of the dialogue session inside a context record.
pub const SESSION_KEY: &str = "agentSession";

/// The opaque context blob of one conversation.
pub type ContextRecord = Map<String, Value>;

/// Keyed storage of context records.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Read the context of a conversation, `None` if it was never written.
    async fn load(&self, conversation_id: &str) -> Result<Option<ContextRecord>, DocketError>;

    /// Replace the context of a conversation.
    async fn store(&self, conversation_id: &str, context: ContextRecord)
        -> Result<(), DocketError>;
}

/// Merge `updates` into a conversation's context, keeping the session intact.
///
/// Every key of `updates` overwrites its sibling, except [`SESSION_KEY`],
/// which is dropped from the update: only the session store writes it.
pub async fn merge_context(
    store: &dyn ContextStore,
    conversation_id: &str,
    updates: ContextRecord,
) -> Result<ContextRecord, DocketError> {
    let mut context = store.load(conversation_id).await?.unwrap_or_default();
    for (key, value) in updates {
        if key == SESSION_KEY {
            debug!(conversation_id, "Ignoring session key in context merge");
            continue;
        }
        context.insert(key, value);
    }
    store.store(conversation_id, context.clone()).await?;
    Ok(context)
}

// =============================================================================
// In-memory store
// =============================================================================

/// Context store backed by a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    records: Mutex<HashMap<String, ContextRecord>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, ContextRecord>>, DocketError> {
        self.records
            .lock()
            .map_err(|e| DocketError::Storage(format!("context lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ContextRecord>, DocketError> {
        Ok(self.lock()?.get(conversation_id).cloned())
    }

    async fn store(
        &self,
        conversation_id: &str,
        context: ContextRecord,
    ) -> Result<(), DocketError> {
        self.lock()?.insert(conversation_id.to_string(), context);
        Ok(())
    }
}

// =============================================================================
// SQLite store
// =============================================================================

/// Context store persisting records in the `conversations` table.
pub struct SqliteContextStore {
    db: Arc<Database>,
}

impl SqliteContextStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ContextRecord>, DocketError> {
        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT context FROM conversations WHERE id = ?1",
                rusqlite::params![conversation_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DocketError::Storage(format!("Failed to load context: {}", e)))
        })?;

        match raw {
            None => Ok(None),
            Some(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => Ok(Some(map)),
                Value::Null => Ok(Some(Map::new())),
                other => Err(DocketError::Serialization(format!(
                    "context of {} is not an object: {}",
                    conversation_id, other
                ))),
            },
        }
    }

    async fn store(
        &self,
        conversation_id: &str,
        context: ContextRecord,
    ) -> Result<(), DocketError> {
        let text = serde_json::to_string(&Value::Object(context))?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, context, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO UPDATE
                    SET context = excluded.context, updated_at = excluded.updated_at",
                rusqlite::params![conversation_id, text, Timestamp::now().0],
            )
            .map_err(|e| DocketError::Storage(format!("Failed to store context: {}", e)))?;
            Ok(())
        })
    }
}
