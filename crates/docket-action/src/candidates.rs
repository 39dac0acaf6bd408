//! Candidate sources for resolved fields.

use std::sync::Arc;

use async_trait::async_trait;

use docket_storage::TicketRepository;

use crate::error::ActionError;
use crate::types::{EntityCandidate, EntityKind};

/// Fetches the live candidate list of an entity kind for an organization.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(
        &self,
        kind: EntityKind,
        organization_id: &str,
    ) -> Result<Vec<EntityCandidate>, ActionError>;
}

/// Candidate source reading categories and teams from the repository.
///
/// Categories are the active ones, newest first. Teams are sorted by name.
pub struct RepositoryCandidates {
    repo: Arc<TicketRepository>,
}

impl RepositoryCandidates {
    pub fn new(repo: Arc<TicketRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CandidateSource for RepositoryCandidates {
    async fn fetch_candidates(
        &self,
        kind: EntityKind,
        organization_id: &str,
    ) -> Result<Vec<EntityCandidate>, ActionError> {
        let candidates = match kind {
            EntityKind::Category => self
                .repo
                .list_active_categories(organization_id)
                .map_err(|e| ActionError::CandidateFetch(e.to_string()))?
                .into_iter()
                .map(|c| EntityCandidate::new(c.id, c.name))
                .collect::<Vec<_>>(),
            EntityKind::Team => self
                .repo
                .list_teams(organization_id)
                .map_err(|e| ActionError::CandidateFetch(e.to_string()))?
                .into_iter()
                .map(|t| EntityCandidate::new(t.id, t.name))
                .collect::<Vec<_>>(),
        };
        tracing::debug!(%kind, organization_id, count = candidates.len(), "Fetched candidates");
        Ok(candidates)
    }
}
