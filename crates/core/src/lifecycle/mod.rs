//! Status, assignment, and notes changes for submitted leads.
//!
//! Every operation is all-or-nothing on the record it is handed: a rejected call
//! leaves the record exactly as it was, and repeating a call with the value the
//! record already holds changes nothing (no revision bump, no audit event).

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::agent::{AgentDirectory, AgentId};
use crate::domain::lead::{Assignment, LeadId, LeadRecord, LeadStatus};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any status may follow any other.
    #[default]
    Unrestricted,
    /// Decided leads (approved/declined) cannot be reopened to pending or reviewing.
    Guarded,
}

impl TransitionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Guarded => "guarded",
        }
    }

    pub fn permits(self, from: LeadStatus, to: LeadStatus) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Guarded => from == to || !(from.is_decided() && !to.is_decided()),
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unrestricted" => Ok(Self::Unrestricted),
            "guarded" => Ok(Self::Guarded),
            other => Err(format!("unsupported transition policy `{other}` (expected unrestricted|guarded)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeadChange {
    Status { from: LeadStatus, to: LeadStatus },
    Assignment { from: Assignment, to: Assignment },
    Notes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LifecycleOutcome {
    pub lead_id: LeadId,
    pub change: LeadChange,
    /// False when the record already held the requested value.
    pub applied: bool,
    pub revision: u64,
}

pub struct LeadLifecycle<D, S> {
    directory: D,
    sink: S,
    policy: TransitionPolicy,
}

impl<D, S> LeadLifecycle<D, S>
where
    D: AgentDirectory,
    S: AuditSink,
{
    pub fn new(directory: D, sink: S, policy: TransitionPolicy) -> Self {
        Self { directory, sink, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn transition(
        &self,
        record: &mut LeadRecord,
        to: LeadStatus,
        audit: &AuditContext,
    ) -> Result<LifecycleOutcome, DomainError> {
        let from = record.status();
        if !self.policy.permits(from, to) {
            let error = DomainError::InvalidLeadTransition { from, to };
            self.sink.emit(
                self.event(record, audit, "lead.transition_rejected", AuditOutcome::Rejected)
                    .with_metadata("from", from.as_str())
                    .with_metadata("to", to.as_str())
                    .with_metadata("policy", self.policy.as_str()),
            );
            return Err(error);
        }

        let applied = from != to;
        if applied {
            record.set_status(to, Utc::now());
            self.sink.emit(
                self.event(record, audit, "lead.status_changed", AuditOutcome::Success)
                    .with_metadata("from", from.as_str())
                    .with_metadata("to", to.as_str()),
            );
        }

        Ok(self.outcome(record, LeadChange::Status { from, to }, applied))
    }

    /// `None` records an explicit "unassigned" decision.
    pub fn assign(
        &self,
        record: &mut LeadRecord,
        agent: Option<AgentId>,
        audit: &AuditContext,
    ) -> Result<LifecycleOutcome, DomainError> {
        let target = match agent {
            Some(agent) => match self.check_agent(&agent) {
                Ok(()) => Assignment::Agent(agent),
                Err(error) => {
                    self.sink.emit(
                        self.event(record, audit, "lead.assignment_rejected", AuditOutcome::Rejected)
                            .with_metadata("agent", agent.0.as_str())
                            .with_metadata("error", error.to_string()),
                    );
                    return Err(error);
                }
            },
            None => Assignment::Unassigned,
        };

        let from = record.assignment().clone();
        let applied = from != target;
        if applied {
            record.set_assignment(target.clone(), Utc::now());
            self.sink.emit(
                self.event(record, audit, "lead.assignment_changed", AuditOutcome::Success)
                    .with_metadata("from", from.to_string())
                    .with_metadata("to", target.to_string()),
            );
        }

        Ok(self.outcome(record, LeadChange::Assignment { from, to: target }, applied))
    }

    pub fn annotate(
        &self,
        record: &mut LeadRecord,
        notes: impl Into<String>,
        audit: &AuditContext,
    ) -> Result<LifecycleOutcome, DomainError> {
        let notes = notes.into();
        let applied = record.notes() != notes;
        if applied {
            let length = notes.chars().count();
            record.set_notes(notes, Utc::now());
            self.sink.emit(
                self.event(record, audit, "lead.notes_changed", AuditOutcome::Success)
                    .with_metadata("length", length.to_string()),
            );
        }

        Ok(self.outcome(record, LeadChange::Notes, applied))
    }

    fn check_agent(&self, agent: &AgentId) -> Result<(), DomainError> {
        let identity = self.directory.resolve(agent)?;
        if !identity.active {
            return Err(DomainError::AgentInactive(identity.id));
        }
        Ok(())
    }

    fn event(
        &self,
        record: &LeadRecord,
        audit: &AuditContext,
        event_type: &str,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            Some(record.id().clone()),
            audit,
            event_type,
            AuditCategory::Lifecycle,
            outcome,
        )
        .with_metadata("revision", record.revision().to_string())
    }

    fn outcome(&self, record: &LeadRecord, change: LeadChange, applied: bool) -> LifecycleOutcome {
        LifecycleOutcome { lead_id: record.id().clone(), change, applied, revision: record.revision() }
    }
}
