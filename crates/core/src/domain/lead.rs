use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::errors::DomainError;
use crate::intake::values::ValueMap;
use crate::submission::ReferenceToken;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Reviewing,
    Approved,
    Declined,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 4] = [Self::Pending, Self::Reviewing, Self::Approved, Self::Declined];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }

    /// Approved and declined are decisions; the others are still open.
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Approved | Self::Declined)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "reviewing" => Ok(Self::Reviewing),
            "approved" => Ok(Self::Approved),
            "declined" => Ok(Self::Declined),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported lead status `{other}` (expected pending|reviewing|approved|declined)"
            ))),
        }
    }
}

/// `Unassigned` is an explicit operator decision; `Undecided` means nobody has
/// looked at assignment yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "agent", rename_all = "snake_case")]
pub enum Assignment {
    #[default]
    Undecided,
    Unassigned,
    Agent(AgentId),
}

impl Assignment {
    pub fn agent(&self) -> Option<&AgentId> {
        match self {
            Self::Agent(agent) => Some(agent),
            _ => None,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undecided => f.write_str("undecided"),
            Self::Unassigned => f.write_str("unassigned"),
            Self::Agent(agent) => write!(f, "{agent}"),
        }
    }
}

/// One submitted application. Identity and application data are fixed at
/// creation; status, assignment, and notes change only through the lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    id: LeadId,
    reference: ReferenceToken,
    application: ValueMap,
    status: LeadStatus,
    assignment: Assignment,
    notes: String,
    submitted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    revision: u64,
}

impl LeadRecord {
    pub fn from_submission(
        id: LeadId,
        reference: ReferenceToken,
        application: ValueMap,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reference,
            application,
            status: LeadStatus::Pending,
            assignment: Assignment::Undecided,
            notes: String::new(),
            submitted_at,
            updated_at: submitted_at,
            revision: 0,
        }
    }

    pub fn id(&self) -> &LeadId {
        &self.id
    }

    pub fn reference(&self) -> &ReferenceToken {
        &self.reference
    }

    pub fn application(&self) -> &ValueMap {
        &self.application
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn applicant_name(&self) -> Option<String> {
        let part = |key: &str| {
            self.application.get(key).and_then(|value| value.as_text()).map(str::trim)
        };
        let name = [part("firstName"), part("lastName")]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }

    pub(crate) fn set_status(&mut self, status: LeadStatus, at: DateTime<Utc>) {
        self.status = status;
        self.bump(at);
    }

    pub(crate) fn set_assignment(&mut self, assignment: Assignment, at: DateTime<Utc>) {
        self.assignment = assignment;
        self.bump(at);
    }

    pub(crate) fn set_notes(&mut self, notes: String, at: DateTime<Utc>) {
        self.notes = notes;
        self.bump(at);
    }

    fn bump(&mut self, at: DateTime<Utc>) {
        self.revision += 1;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Assignment, LeadId, LeadRecord, LeadStatus};
    use crate::intake::values::{FieldValue, ValueMap};
    use crate::submission::ReferenceToken;

    fn record() -> LeadRecord {
        let application: ValueMap = [
            ("firstName".to_owned(), FieldValue::from("Mary")),
            ("lastName".to_owned(), FieldValue::from(" Johnson ")),
        ]
        .into_iter()
        .collect();
        LeadRecord::from_submission(
            LeadId("lead-2".to_owned()),
            ReferenceToken("K3J9QX2M".to_owned()),
            application,
            Utc::now(),
        )
    }

    #[test]
    fn new_records_start_pending_and_undecided() {
        let record = record();
        assert_eq!(record.status(), LeadStatus::Pending);
        assert_eq!(record.assignment(), &Assignment::Undecided);
        assert_eq!(record.revision(), 0);
        assert_eq!(record.applicant_name().as_deref(), Some("Mary Johnson"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Reviewing".parse::<LeadStatus>(), Ok(LeadStatus::Reviewing));
        assert!("archived".parse::<LeadStatus>().is_err());
        assert!(LeadStatus::Declined.is_decided());
        assert!(!LeadStatus::Reviewing.is_decided());
    }

    #[test]
    fn assignment_serializes_with_explicit_state() {
        let unassigned = serde_json::to_string(&Assignment::Unassigned).expect("serialize");
        let undecided = serde_json::to_string(&Assignment::Undecided).expect("serialize");
        assert_ne!(unassigned, undecided);
        assert_eq!(unassigned, r#"{"state":"unassigned"}"#);
    }
}
