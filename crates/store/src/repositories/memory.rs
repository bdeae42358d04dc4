use std::collections::HashMap;

use tokio::sync::RwLock;

use loamdesk_core::domain::lead::{LeadId, LeadRecord};
use loamdesk_core::submission::ReferenceToken;

use super::{LeadFilter, LeadRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<String, LeadRecord>>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.get(&id.0).cloned())
    }

    async fn find_by_reference(
        &self,
        reference: &ReferenceToken,
    ) -> Result<Option<LeadRecord>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.values().find(|lead| lead.reference() == reference).cloned())
    }

    async fn list(&self, filter: &LeadFilter) -> Result<Vec<LeadRecord>, RepositoryError> {
        let leads = self.leads.read().await;
        let mut matching =
            leads.values().filter(|lead| filter.matches(lead)).cloned().collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            right.submitted_at().cmp(&left.submitted_at()).then_with(|| left.id().cmp(right.id()))
        });
        Ok(matching)
    }

    async fn save(&self, lead: LeadRecord) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        if let Some(stored) = leads.get(&lead.id().0) {
            if lead.revision() != stored.revision() + 1 {
                return Err(RepositoryError::Conflict {
                    id: lead.id().clone(),
                    stored: stored.revision(),
                    attempted: lead.revision(),
                });
            }
        } else if leads.values().any(|other| other.reference() == lead.reference()) {
            return Err(RepositoryError::DuplicateReference(lead.reference().clone()));
        }
        leads.insert(lead.id().0.clone(), lead);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use loamdesk_core::audit::{AuditContext, InMemoryAuditSink};
    use loamdesk_core::domain::agent::{AgentDirectory, AgentId, AgentIdentity};
    use loamdesk_core::domain::lead::{LeadId, LeadRecord, LeadStatus};
    use loamdesk_core::errors::NotFoundError;
    use loamdesk_core::intake::values::{FieldValue, ValueMap};
    use loamdesk_core::lifecycle::{LeadLifecycle, TransitionPolicy};
    use loamdesk_core::submission::ReferenceToken;

    use crate::repositories::{InMemoryLeadRepository, LeadFilter, LeadRepository, RepositoryError};

    struct NoAgents;

    impl AgentDirectory for NoAgents {
        fn resolve(&self, id: &AgentId) -> Result<AgentIdentity, NotFoundError> {
            Err(NotFoundError::Agent(id.clone()))
        }
    }

    fn lead(id: &str, reference: &str, name: (&str, &str), age_days: i64) -> LeadRecord {
        let application: ValueMap = [
            ("firstName".to_owned(), FieldValue::from(name.0)),
            ("lastName".to_owned(), FieldValue::from(name.1)),
            ("email".to_owned(), FieldValue::from(format!("{}@example.com", name.0.to_lowercase()))),
        ]
        .into_iter()
        .collect();
        LeadRecord::from_submission(
            LeadId(id.to_owned()),
            ReferenceToken(reference.to_owned()),
            application,
            Utc::now() - Duration::days(age_days),
        )
    }

    #[tokio::test]
    async fn in_memory_lead_repo_round_trip() {
        let repo = InMemoryLeadRepository::default();
        let record = lead("1", "AAAA1111", ("John", "Smith"), 2);

        repo.save(record.clone()).await.expect("save lead");

        assert_eq!(repo.find_by_id(record.id()).await.expect("find"), Some(record.clone()));
        assert_eq!(
            repo.find_by_reference(record.reference()).await.expect("find by reference"),
            Some(record)
        );
        assert_eq!(repo.find_by_id(&LeadId("missing".to_owned())).await.expect("find"), None);
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let repo = InMemoryLeadRepository::default();
        let lifecycle =
            LeadLifecycle::new(NoAgents, InMemoryAuditSink::default(), TransitionPolicy::Unrestricted);
        let mut approved = lead("2", "BBBB2222", ("Mary", "Johnson"), 4);
        lifecycle
            .transition(&mut approved, LeadStatus::Approved, &AuditContext::new("test", "test"))
            .expect("approve");

        repo.save(lead("1", "AAAA1111", ("John", "Smith"), 2)).await.expect("save");
        repo.save(approved).await.expect("save");
        repo.save(lead("3", "CCCC3333", ("Robert", "Williams"), 0)).await.expect("save");

        let all = repo.list(&LeadFilter::default()).await.expect("list");
        let ids = all.iter().map(|lead| lead.id().0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["3", "1", "2"]);

        let approved = repo
            .list(&LeadFilter { status: Some(LeadStatus::Approved), ..LeadFilter::default() })
            .await
            .expect("list approved");
        assert_eq!(approved.len(), 1);

        let searched = repo
            .list(&LeadFilter { search: Some("ROBERT@".to_owned()), ..LeadFilter::default() })
            .await
            .expect("search");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].id().0, "3");
    }

    #[tokio::test]
    async fn stale_writes_are_rejected() {
        let repo = InMemoryLeadRepository::default();
        let lifecycle =
            LeadLifecycle::new(NoAgents, InMemoryAuditSink::default(), TransitionPolicy::Unrestricted);
        let original = lead("1", "AAAA1111", ("John", "Smith"), 1);
        let mut updated = original.clone();
        lifecycle
            .annotate(&mut updated, "called applicant", &AuditContext::new("test", "test"))
            .expect("annotate");

        repo.save(original.clone()).await.expect("save original");
        repo.save(updated).await.expect("save update");
        let error = repo.save(original).await.expect_err("stale write must fail");

        assert!(matches!(error, RepositoryError::Conflict { stored: 1, attempted: 0, .. }));
    }

    #[tokio::test]
    async fn diverging_updates_from_the_same_revision_conflict() {
        let repo = InMemoryLeadRepository::default();
        let lifecycle =
            LeadLifecycle::new(NoAgents, InMemoryAuditSink::default(), TransitionPolicy::Unrestricted);
        let audit = AuditContext::new("test", "test");
        let original = lead("1", "AAAA1111", ("John", "Smith"), 1);
        repo.save(original.clone()).await.expect("save original");

        let mut approved = original.clone();
        lifecycle.transition(&mut approved, LeadStatus::Approved, &audit).expect("approve");
        let mut annotated = original;
        lifecycle.annotate(&mut annotated, "left a voicemail", &audit).expect("annotate");

        repo.save(approved).await.expect("first update wins");
        let error = repo.save(annotated).await.expect_err("second update must conflict");
        assert!(matches!(error, RepositoryError::Conflict { stored: 1, attempted: 1, .. }));

        let stored =
            repo.find_by_id(&LeadId("1".to_owned())).await.expect("find").expect("present");
        assert_eq!(stored.status(), LeadStatus::Approved);
        assert_eq!(stored.notes(), "");
    }

    #[tokio::test]
    async fn duplicate_references_are_rejected_for_new_leads() {
        let repo = InMemoryLeadRepository::default();
        repo.save(lead("1", "AAAA1111", ("John", "Smith"), 1)).await.expect("save");

        let error = repo
            .save(lead("2", "AAAA1111", ("Mary", "Johnson"), 1))
            .await
            .expect_err("duplicate reference");
        assert!(matches!(error, RepositoryError::DuplicateReference(_)));
    }
}
