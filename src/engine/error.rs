use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed, past or oversized date range. Checked before any lock.
    InvalidRange(&'static str),
    ResourceNotFound(Ulid),
    /// Overlaps the committed reservation with this id.
    DateConflict(Ulid),
    /// Gave up waiting for the resource's lock.
    Timeout(Ulid),
    /// Persistence failed. If raised by a commit, its outcome is unknown.
    StorageFailure(String),
}

impl EngineError {
    /// Expected outcomes the caller fixes by changing its input.
    /// `Timeout` and `StorageFailure` are infrastructure trouble.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRange(_)
                | EngineError::ResourceNotFound(_)
                | EngineError::DateConflict(_)
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange(msg) => write!(f, "invalid date range: {msg}"),
            EngineError::ResourceNotFound(id) => write!(f, "resource not found: {id}"),
            EngineError::DateConflict(id) => write!(f, "dates conflict with reservation: {id}"),
            EngineError::Timeout(id) => write!(f, "timed out waiting for resource: {id}"),
            EngineError::StorageFailure(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::ResourceNotFound(id),
            StoreError::Storage(msg) => EngineError::StorageFailure(msg),
            other => EngineError::StorageFailure(other.to_string()),
        }
    }
}
