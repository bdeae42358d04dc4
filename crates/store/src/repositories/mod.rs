use async_trait::async_trait;
use thiserror::Error;

use loamdesk_core::domain::agent::AgentId;
use loamdesk_core::domain::lead::{Assignment, LeadId, LeadRecord, LeadStatus};
use loamdesk_core::errors::ApplicationError;
use loamdesk_core::intake::values::FieldValue;
use loamdesk_core::submission::ReferenceToken;

pub mod memory;

pub use memory::InMemoryLeadRepository;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("lead `{id}` was modified concurrently (stored revision {stored}, attempted {attempted})")]
    Conflict { id: LeadId, stored: u64, attempted: u64 },
    #[error("reference `{0}` is already in use")]
    DuplicateReference(ReferenceToken),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Narrowing criteria for lead listings. Empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub agent: Option<AgentId>,
    /// Case-insensitive match on applicant name, email, or reference.
    pub search: Option<String>,
}

impl LeadFilter {
    pub fn matches(&self, lead: &LeadRecord) -> bool {
        if self.status.is_some_and(|status| status != lead.status()) {
            return false;
        }
        if let Some(agent) = &self.agent {
            if lead.assignment() != &Assignment::Agent(agent.clone()) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|term| !term.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                let email = lead.application().get("email").and_then(FieldValue::as_text);
                [lead.applicant_name().as_deref(), email, Some(lead.reference().as_str())]
                    .into_iter()
                    .flatten()
                    .any(|candidate| candidate.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError>;
    async fn find_by_reference(
        &self,
        reference: &ReferenceToken,
    ) -> Result<Option<LeadRecord>, RepositoryError>;
    /// Newest submission first.
    async fn list(&self, filter: &LeadFilter) -> Result<Vec<LeadRecord>, RepositoryError>;
    /// Updates must carry exactly the stored revision plus one; anything else is a
    /// stale write and is rejected with [`RepositoryError::Conflict`].
    async fn save(&self, lead: LeadRecord) -> Result<(), RepositoryError>;
}
