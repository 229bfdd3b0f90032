//! Error taxonomy (§7): user input, Store transient/fatal, and DLQ errors.
//!
//! In-flight job attempt failures are never represented as Rust errors — they
//! are data (`Outcome`, `FailureKind`) routed through the retry/DLQ state
//! machine in [`crate::worker`], per §7's governing principle.

use thiserror::Error;

/// Errors surfaced by the persistent Store (component A).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A caller tried to insert a job whose id already exists.
    #[error("job '{0}' already exists")]
    DuplicateId(String),

    /// No job exists with the given id.
    #[error("no job with id '{0}'")]
    NotFound(String),

    /// DLQ-retry was attempted on a job that is not in the `dead` state.
    #[error("job '{0}' is not in the dead-letter queue")]
    NotDead(String),

    /// A config value failed validation (§3.2).
    #[error("invalid config value for '{key}': {reason}")]
    InvalidConfigValue { key: String, reason: String },

    /// The underlying database reported a transient condition (busy/locked)
    /// and retries were exhausted (§4.1 Failure semantics).
    #[error("store unavailable after retrying: {0}")]
    Unavailable(String),

    /// A non-retriable storage failure: schema mismatch, disk I/O, etc. Kept
    /// as a plain message rather than a driver error type so this crate
    /// stays backend-agnostic; concrete stores map their own error type's
    /// `Display` into this variant.
    #[error("store error: {0}")]
    Fatal(String),
}

impl StoreError {
    /// True for conditions the CLI should report as exit code 1 (user input)
    /// rather than 2 (transient system error), per §6.1.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateId(_)
                | StoreError::NotFound(_)
                | StoreError::NotDead(_)
                | StoreError::InvalidConfigValue { .. }
        )
    }
}

/// Errors surfaced by the Job Manager's semantic validation (component B).
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("malformed run_at timestamp: {0}")]
    InvalidRunAt(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ManagerError {
    pub fn is_user_error(&self) -> bool {
        match self {
            ManagerError::MissingField(_) | ManagerError::InvalidRunAt(_) => true,
            ManagerError::Store(e) => e.is_user_error(),
        }
    }
}
