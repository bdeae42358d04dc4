//! In-process adapters for the collaborators the lead core depends on: lead
//! storage, the agent roster, and intake submission.

pub mod desk;
pub mod directory;
pub mod fixtures;
pub mod intake;
pub mod repositories;

pub use desk::LeadDesk;
pub use directory::{AgentChanges, DirectoryError, InMemoryAgentDirectory};
pub use intake::RepositorySubmissionService;
pub use repositories::{InMemoryLeadRepository, LeadFilter, LeadRepository, RepositoryError};
