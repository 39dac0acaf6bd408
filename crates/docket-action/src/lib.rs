//! Action catalogue for Docket.
//!
//! Declares the schema-driven actions a conversation can run, resolves
//! free-text answers against live entity lists, and dispatches collected
//! fields to each action's business effect.

pub mod candidates;
pub mod definitions;
pub mod error;
pub mod executor;
pub mod notify;
pub mod registry;
pub mod resolver;
pub mod types;

pub use candidates::{CandidateSource, RepositoryCandidates};
pub use definitions::{CreateCategory, CreateInternalTicket, CreateRequestForm};
pub use error::ActionError;
pub use executor::ActionExecutor;
pub use notify::{Notifier, TracingNotifier};
pub use registry::{is_role_allowed, ActionDefinition, ActionRegistry};
pub use resolver::{format_list, resolve};
pub use types::{
    field_value, normalize_boolean, ActionResult, CollectedFields, DependsOn, EntityBinding,
    EntityCandidate, EntityKind, FetchTrigger, FieldSpec, Validator,
};
