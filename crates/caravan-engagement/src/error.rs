use thiserror::Error;

use crate::model::ContentId;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("content item not found: {0}")]
    NotFound(ContentId),
    /// The store detected a conflicting concurrent write. The caller must
    /// re-attempt the whole operation from a fresh read.
    #[error("transaction conflict; retry the whole operation")]
    Retryable,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl EngagementError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngagementError::Retryable)
    }
}

impl From<StoreError> for EngagementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => EngagementError::Retryable,
            other => EngagementError::Store(other),
        }
    }
}
