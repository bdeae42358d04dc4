use chrono::{DateTime, Utc};

use loamdesk_core::audit::{AuditContext, InMemoryAuditSink};
use loamdesk_core::domain::agent::{AgentDirectory, AgentId, AgentIdentity};
use loamdesk_core::domain::lead::{LeadId, LeadRecord, LeadStatus};
use loamdesk_core::errors::{ApplicationError, DomainError};
use loamdesk_core::intake::values::{FieldValue, ValueMap};
use loamdesk_core::lifecycle::{LeadLifecycle, TransitionPolicy};
use loamdesk_core::submission::ReferenceToken;

use crate::repositories::LeadRepository;

/// Demo roster. Emily Wilson is inactive so rejected assignments can be shown.
const SEED_AGENTS: &[(&str, &str, &str, bool)] = &[
    ("agent-1", "Sarah Johnson", "sarah.johnson@loamdesk.test", true),
    ("agent-2", "Mike Brown", "mike.brown@loamdesk.test", true),
    ("agent-3", "David Clark", "david.clark@loamdesk.test", true),
    ("agent-4", "Emily Wilson", "emily.wilson@loamdesk.test", false),
];

struct SeedLead {
    id: &'static str,
    reference: &'static str,
    submitted_at: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    phone: &'static str,
    loan_amount: i64,
    loan_term: i64,
    loan_purpose: &'static str,
    employment_status: &'static str,
    employer: Option<&'static str>,
    monthly_income: i64,
    status: LeadStatus,
    agent: &'static str,
    notes: &'static str,
}

const SEED_LEADS: &[SeedLead] = &[
    SeedLead {
        id: "1",
        reference: "JS7Q2K4M",
        submitted_at: "2025-06-05T10:30:00Z",
        first_name: "John",
        last_name: "Smith",
        email: "john.smith@example.com",
        phone: "555-123-4567",
        loan_amount: 25_000,
        loan_term: 36,
        loan_purpose: "Home Improvement",
        employment_status: "full-time",
        employer: Some("Acme Corporation"),
        monthly_income: 5_500,
        status: LeadStatus::Pending,
        agent: "agent-1",
        notes: "Applicant has good credit history.",
    },
    SeedLead {
        id: "2",
        reference: "MJ4T8W1C",
        submitted_at: "2025-06-03T14:15:00Z",
        first_name: "Mary",
        last_name: "Johnson",
        email: "mary.j@example.com",
        phone: "555-987-6543",
        loan_amount: 15_000,
        loan_term: 24,
        loan_purpose: "Debt Consolidation",
        employment_status: "part-time",
        employer: Some("Global Services Inc."),
        monthly_income: 3_200,
        status: LeadStatus::Approved,
        agent: "agent-2",
        notes: "Approved for lower amount than requested.",
    },
    SeedLead {
        id: "3",
        reference: "RW9B3N6P",
        submitted_at: "2025-06-07T09:45:00Z",
        first_name: "Robert",
        last_name: "Williams",
        email: "rob.w@example.com",
        phone: "555-456-7890",
        loan_amount: 50_000,
        loan_term: 60,
        loan_purpose: "Business",
        employment_status: "self-employed",
        employer: None,
        monthly_income: 7_800,
        status: LeadStatus::Reviewing,
        agent: "agent-3",
        notes: "Needs additional documentation for business plan.",
    },
];

pub fn demo_agents() -> Vec<AgentIdentity> {
    SEED_AGENTS
        .iter()
        .map(|(id, name, email, active)| AgentIdentity {
            id: AgentId((*id).to_owned()),
            name: (*name).to_owned(),
            email: (*email).to_owned(),
            active: *active,
        })
        .collect()
}

/// Saves the demo leads, driving each one through the lifecycle so status,
/// assignment, and notes are reached the same way an operator would reach them.
pub async fn seed_demo_leads<R, D>(
    repository: &R,
    directory: &D,
) -> Result<Vec<LeadRecord>, ApplicationError>
where
    R: LeadRepository + ?Sized,
    D: AgentDirectory,
{
    let lifecycle =
        LeadLifecycle::new(directory, InMemoryAuditSink::default(), TransitionPolicy::Unrestricted);
    let audit = AuditContext::new("seed", "system");
    let mut seeded = Vec::with_capacity(SEED_LEADS.len());

    for seed in SEED_LEADS {
        let submitted_at = DateTime::parse_from_rfc3339(seed.submitted_at)
            .map_err(|error| {
                DomainError::InvariantViolation(format!("bad seed timestamp for lead {}: {error}", seed.id))
            })?
            .with_timezone(&Utc);

        let mut lead = LeadRecord::from_submission(
            LeadId(seed.id.to_owned()),
            ReferenceToken(seed.reference.to_owned()),
            seed.application(),
            submitted_at,
        );
        lifecycle.transition(&mut lead, seed.status, &audit)?;
        lifecycle.assign(&mut lead, Some(AgentId(seed.agent.to_owned())), &audit)?;
        lifecycle.annotate(&mut lead, seed.notes, &audit)?;

        repository.save(lead.clone()).await?;
        seeded.push(lead);
    }

    Ok(seeded)
}

impl SeedLead {
    fn application(&self) -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("firstName".to_owned(), FieldValue::from(self.first_name));
        values.insert("lastName".to_owned(), FieldValue::from(self.last_name));
        values.insert("email".to_owned(), FieldValue::from(self.email));
        values.insert("phone".to_owned(), FieldValue::from(self.phone));
        values.insert("loanAmount".to_owned(), FieldValue::from(self.loan_amount));
        values.insert("loanTerm".to_owned(), FieldValue::from(self.loan_term));
        values.insert("loanPurpose".to_owned(), FieldValue::from(self.loan_purpose));
        values.insert("employmentStatus".to_owned(), FieldValue::from(self.employment_status));
        if let Some(employer) = self.employer {
            values.insert("employerName".to_owned(), FieldValue::from(employer));
        }
        values.insert("monthlyIncome".to_owned(), FieldValue::from(self.monthly_income));
        values
    }
}

#[cfg(test)]
mod tests {
    use loamdesk_core::domain::agent::AgentId;
    use loamdesk_core::domain::lead::{Assignment, LeadStatus};

    use super::{demo_agents, seed_demo_leads};
    use crate::directory::InMemoryAgentDirectory;
    use crate::repositories::{InMemoryLeadRepository, LeadFilter, LeadRepository};

    #[tokio::test]
    async fn seeds_three_leads_with_their_lifecycle_state() {
        let repository = InMemoryLeadRepository::default();
        let directory = InMemoryAgentDirectory::new(demo_agents());

        let seeded = seed_demo_leads(&repository, &directory).await.expect("seed");
        let stored = repository.list(&LeadFilter::default()).await.expect("list");

        assert_eq!(seeded.len(), 3);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].applicant_name().as_deref(), Some("Robert Williams"));
        assert_eq!(stored[0].status(), LeadStatus::Reviewing);
        assert_eq!(stored[2].status(), LeadStatus::Approved);
        assert_eq!(stored[2].assignment(), &Assignment::Agent(AgentId("agent-2".to_owned())));
        assert_eq!(stored[2].notes(), "Approved for lower amount than requested.");
    }

    #[test]
    fn roster_has_one_inactive_agent() {
        let inactive = demo_agents().into_iter().filter(|agent| !agent.active).count();
        assert_eq!(inactive, 1);
    }
}
