//! Docket storage crate - SQLite persistence and the conversation context store.
//!
//! Provides a WAL-mode SQLite database with migrations, the opaque
//! per-conversation context record the dialogue session lives inside, and
//! the ticketing repository backing the built-in actions.

pub mod context;
pub mod db;
pub mod migrations;
pub mod repository;

pub use context::{
    merge_context, ContextRecord, ContextStore, InMemoryContextStore, SqliteContextStore,
    SESSION_KEY,
};
pub use db::Database;
pub use repository::{
    Category, NewCategory, NewRequestForm, NewTicket, RequestForm, Team, Ticket, TicketMessage,
    TicketRepository,
};
