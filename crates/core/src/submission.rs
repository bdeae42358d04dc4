use std::fmt;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intake::values::ValueMap;

const TOKEN_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Opaque proof of a successful intake, shown to the applicant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceToken(pub String);

impl ReferenceToken {
    /// Uppercase alphanumeric token of `length` characters.
    pub fn generate<R>(rng: &mut R, length: usize) -> Self
    where
        R: Rng + ?Sized,
    {
        let token = (0..length)
            .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure reported by the external intake store. The cause is kept for logging;
/// the wizard treats every variant as retryable.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionError {
    #[error("submission service unavailable: {0}")]
    Unavailable(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission failed: {0}")]
    Internal(String),
}

#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit(&self, values: &ValueMap) -> Result<ReferenceToken, SubmissionError>;
}
