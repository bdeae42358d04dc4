use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use uuid::Uuid;

use loamdesk_core::domain::lead::{LeadId, LeadRecord};
use loamdesk_core::intake::values::ValueMap;
use loamdesk_core::submission::{ReferenceToken, SubmissionError, SubmissionService};

use crate::repositories::{LeadRepository, RepositoryError};

const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// Stores each completed application as a new `pending` lead and hands back its
/// reference token.
pub struct RepositorySubmissionService<R> {
    repository: Arc<R>,
    reference_length: usize,
    rng: Mutex<StdRng>,
}

impl<R> RepositorySubmissionService<R>
where
    R: LeadRepository,
{
    pub fn new(repository: Arc<R>, reference_length: usize) -> Self {
        Self { repository, reference_length, rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Deterministic token sequence, for tests and demos.
    pub fn with_seed(repository: Arc<R>, reference_length: usize, seed: u64) -> Self {
        Self { repository, reference_length, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    fn next_reference(&self) -> ReferenceToken {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        ReferenceToken::generate(&mut *rng, self.reference_length)
    }
}

#[async_trait]
impl<R> SubmissionService for RepositorySubmissionService<R>
where
    R: LeadRepository,
{
    async fn submit(&self, values: &ValueMap) -> Result<ReferenceToken, SubmissionError> {
        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let reference = self.next_reference();
            let lead = LeadRecord::from_submission(
                LeadId(Uuid::new_v4().to_string()),
                reference.clone(),
                values.clone(),
                Utc::now(),
            );
            let lead_id = lead.id().clone();

            match self.repository.save(lead).await {
                Ok(()) => {
                    info!(
                        event_name = "intake.lead_created",
                        lead_id = %lead_id,
                        reference = %reference,
                        "stored submitted application as pending lead"
                    );
                    return Ok(reference);
                }
                Err(RepositoryError::DuplicateReference(_)) => {
                    warn!(
                        event_name = "intake.reference_collision",
                        attempt,
                        "generated reference already in use, retrying"
                    );
                }
                Err(error) => return Err(SubmissionError::Unavailable(error.to_string())),
            }
        }

        Err(SubmissionError::Internal(format!(
            "could not allocate a unique reference after {MAX_REFERENCE_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use loamdesk_core::domain::lead::{Assignment, LeadStatus};
    use loamdesk_core::intake::values::{FieldValue, ValueMap};
    use loamdesk_core::submission::SubmissionService;

    use super::RepositorySubmissionService;
    use crate::repositories::{InMemoryLeadRepository, LeadRepository};

    fn answers() -> ValueMap {
        [("firstName", "Ada"), ("lastName", "Lovelace"), ("email", "ada@example.com")]
            .into_iter()
            .map(|(key, value)| (key.to_owned(), FieldValue::from(value)))
            .collect()
    }

    #[tokio::test]
    async fn submission_creates_pending_undecided_lead() {
        let repository = Arc::new(InMemoryLeadRepository::default());
        let service = RepositorySubmissionService::with_seed(repository.clone(), 8, 11);

        let reference = service.submit(&answers()).await.expect("submission succeeds");
        let lead = repository
            .find_by_reference(&reference)
            .await
            .expect("lookup")
            .expect("lead stored");

        assert_eq!(reference.as_str().len(), 8);
        assert_eq!(lead.status(), LeadStatus::Pending);
        assert_eq!(lead.assignment(), &Assignment::Undecided);
        assert_eq!(lead.application(), &answers());
        assert_eq!(lead.applicant_name().as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn colliding_reference_is_regenerated() {
        let repository = Arc::new(InMemoryLeadRepository::default());
        let first = RepositorySubmissionService::with_seed(repository.clone(), 6, 3);
        let replay = RepositorySubmissionService::with_seed(repository.clone(), 6, 3);

        let taken = first.submit(&answers()).await.expect("first submission");
        let fresh = replay.submit(&answers()).await.expect("second submission");

        assert_ne!(taken, fresh);
        assert_eq!(repository.list(&Default::default()).await.expect("list").len(), 2);
    }
}
