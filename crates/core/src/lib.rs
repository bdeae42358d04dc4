pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intake;
pub mod lifecycle;
pub mod submission;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::agent::{AgentDirectory, AgentId, AgentIdentity};
pub use domain::lead::{Assignment, LeadId, LeadRecord, LeadStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError, NotFoundError};
pub use intake::{ValueMap, WizardController, WizardSchema};
pub use lifecycle::{LeadChange, LeadLifecycle, LifecycleOutcome, TransitionPolicy};
pub use submission::{ReferenceToken, SubmissionError, SubmissionService};
