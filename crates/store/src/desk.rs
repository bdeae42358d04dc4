//! Operator-facing lead operations with at-most-one in-flight mutation per lead.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use loamdesk_core::audit::{AuditContext, AuditSink};
use loamdesk_core::domain::agent::{AgentDirectory, AgentId};
use loamdesk_core::domain::lead::{LeadId, LeadRecord, LeadStatus};
use loamdesk_core::errors::{ApplicationError, DomainError, NotFoundError};
use loamdesk_core::lifecycle::{LeadLifecycle, LifecycleOutcome};

use crate::repositories::{LeadFilter, LeadRepository};

pub struct LeadDesk<R, D, S> {
    repository: Arc<R>,
    lifecycle: LeadLifecycle<D, S>,
    locks: Mutex<HashMap<LeadId, Arc<Mutex<()>>>>,
}

impl<R, D, S> LeadDesk<R, D, S>
where
    R: LeadRepository,
    D: AgentDirectory,
    S: AuditSink,
{
    pub fn new(repository: Arc<R>, lifecycle: LeadLifecycle<D, S>) -> Self {
        Self { repository, lifecycle, locks: Mutex::new(HashMap::new()) }
    }

    pub fn lifecycle(&self) -> &LeadLifecycle<D, S> {
        &self.lifecycle
    }

    pub async fn get(&self, id: &LeadId) -> Result<LeadRecord, ApplicationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::from(NotFoundError::Lead(id.clone())).into())
    }

    pub async fn list(&self, filter: &LeadFilter) -> Result<Vec<LeadRecord>, ApplicationError> {
        Ok(self.repository.list(filter).await?)
    }

    pub async fn transition(
        &self,
        id: &LeadId,
        status: LeadStatus,
        audit: &AuditContext,
    ) -> Result<LifecycleOutcome, ApplicationError> {
        self.mutate(id, |lifecycle, lead| lifecycle.transition(lead, status, audit)).await
    }

    pub async fn assign(
        &self,
        id: &LeadId,
        agent: Option<AgentId>,
        audit: &AuditContext,
    ) -> Result<LifecycleOutcome, ApplicationError> {
        self.mutate(id, |lifecycle, lead| lifecycle.assign(lead, agent, audit)).await
    }

    pub async fn annotate(
        &self,
        id: &LeadId,
        notes: String,
        audit: &AuditContext,
    ) -> Result<LifecycleOutcome, ApplicationError> {
        self.mutate(id, |lifecycle, lead| lifecycle.annotate(lead, notes, audit)).await
    }

    /// Load, apply, save under the lead's lock. The stored record is only replaced
    /// when the operation changed something.
    async fn mutate<F>(&self, id: &LeadId, operation: F) -> Result<LifecycleOutcome, ApplicationError>
    where
        F: FnOnce(&LeadLifecycle<D, S>, &mut LeadRecord) -> Result<LifecycleOutcome, DomainError>,
    {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut lead = self.get(id).await?;
        let outcome = operation(&self.lifecycle, &mut lead)?;

        if outcome.applied {
            self.repository.save(lead).await?;
            info!(
                event_name = "lead.updated",
                lead_id = %id,
                revision = outcome.revision,
                "lead change persisted"
            );
        } else {
            debug!(event_name = "lead.unchanged", lead_id = %id, "lead already in requested state");
        }

        Ok(outcome)
    }

    async fn lock_for(&self, id: &LeadId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.clone()).or_default().clone()
    }
}
