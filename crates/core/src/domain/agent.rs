use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::NotFoundError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: AgentId,
    pub name: String,
    pub email: String,
    pub active: bool,
}

/// Agent roster owned by the surrounding system; consulted, never modified, here.
pub trait AgentDirectory: Send + Sync {
    fn resolve(&self, id: &AgentId) -> Result<AgentIdentity, NotFoundError>;
}

impl<T> AgentDirectory for std::sync::Arc<T>
where
    T: AgentDirectory + ?Sized,
{
    fn resolve(&self, id: &AgentId) -> Result<AgentIdentity, NotFoundError> {
        (**self).resolve(id)
    }
}

impl<T> AgentDirectory for &T
where
    T: AgentDirectory + ?Sized,
{
    fn resolve(&self, id: &AgentId) -> Result<AgentIdentity, NotFoundError> {
        (**self).resolve(id)
    }
}
