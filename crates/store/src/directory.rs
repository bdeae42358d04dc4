use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use loamdesk_core::domain::agent::{AgentDirectory, AgentId, AgentIdentity};
use loamdesk_core::errors::{ApplicationError, DomainError, NotFoundError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("agent {0} must not be blank")]
    Blank(&'static str),
}

impl From<DirectoryError> for ApplicationError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::NotFound(error) => DomainError::from(error).into(),
            error @ DirectoryError::Blank(_) => {
                DomainError::InvariantViolation(error.to_string()).into()
            }
        }
    }
}

/// Fields of a roster entry being created or edited. `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

/// Agent roster kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAgentDirectory {
    agents: RwLock<BTreeMap<AgentId, AgentIdentity>>,
}

impl InMemoryAgentDirectory {
    pub fn new(agents: impl IntoIterator<Item = AgentIdentity>) -> Self {
        let agents = agents.into_iter().map(|agent| (agent.id.clone(), agent)).collect();
        Self { agents: RwLock::new(agents) }
    }

    /// Adds an agent under the next free `agent-<n>` id. New agents are active
    /// unless `changes.active` says otherwise.
    pub fn add(&self, changes: AgentChanges) -> Result<AgentIdentity, DirectoryError> {
        let name = required(changes.name, "name")?;
        let email = required(changes.email, "email")?;

        let mut agents = self.write();
        let next = agents
            .keys()
            .filter_map(|id| id.0.strip_prefix("agent-").and_then(|n| n.parse::<u64>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        let agent = AgentIdentity {
            id: AgentId(format!("agent-{next}")),
            name,
            email,
            active: changes.active.unwrap_or(true),
        };
        agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    pub fn update(
        &self,
        id: &AgentId,
        changes: AgentChanges,
    ) -> Result<AgentIdentity, DirectoryError> {
        let name = changes.name.map(|name| required(Some(name), "name")).transpose()?;
        let email = changes.email.map(|email| required(Some(email), "email")).transpose()?;

        let mut agents = self.write();
        let agent = agents.get_mut(id).ok_or_else(|| NotFoundError::Agent(id.clone()))?;
        if let Some(name) = name {
            agent.name = name;
        }
        if let Some(email) = email {
            agent.email = email;
        }
        if let Some(active) = changes.active {
            agent.active = active;
        }
        Ok(agent.clone())
    }

    pub fn set_active(&self, id: &AgentId, active: bool) -> Result<AgentIdentity, DirectoryError> {
        self.update(id, AgentChanges { active: Some(active), ..AgentChanges::default() })
    }

    /// Leads still assigned to a removed agent keep the id; lifecycle operations
    /// then treat it as unknown.
    pub fn remove(&self, id: &AgentId) -> Result<AgentIdentity, DirectoryError> {
        self.write().remove(id).ok_or_else(|| NotFoundError::Agent(id.clone()).into())
    }

    pub fn list(&self) -> Vec<AgentIdentity> {
        self.read().values().cloned().collect()
    }

    /// Looks an agent up by display name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<AgentIdentity> {
        self.list().into_iter().find(|agent| agent.name.eq_ignore_ascii_case(name.trim()))
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<AgentId, AgentIdentity>> {
        match self.agents.read() {
            Ok(agents) => agents,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<AgentId, AgentIdentity>> {
        match self.agents.write() {
            Ok(agents) => agents,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DirectoryError> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or(DirectoryError::Blank(field))
}

impl AgentDirectory for InMemoryAgentDirectory {
    fn resolve(&self, id: &AgentId) -> Result<AgentIdentity, NotFoundError> {
        self.read().get(id).cloned().ok_or_else(|| NotFoundError::Agent(id.clone()))
    }
}
