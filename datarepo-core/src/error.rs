//! Error types for datarepo operations

use thiserror::Error;

/// Configuration errors, raised while assembling a repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required collaborator: {collaborator}")]
    MissingCollaborator { collaborator: String },

    #[error("A cache has already been defined with the same field name: {field}")]
    DuplicateCache { field: String },

    #[error("Field name must not be empty: {field}")]
    EmptyFieldName { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Composite cache store requires at least one delegate store")]
    NoDelegates,
}

/// Per-call dispatch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Undefined cache for field: {field}")]
    UndefinedCache { field: String },
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store {store} failed: {reason}")]
    Backend { store: String, reason: String },

    #[error("Cached payload for {key} could not be encoded or decoded: {reason}")]
    Codec { key: String, reason: String },

    #[error("Cache store lock poisoned")]
    LockPoisoned,
}

/// Data fetcher errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetch failed: {reason}")]
    Backend { reason: String },

    #[error("Fetcher returned {got} results for {expected} ids")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Field {field} is not queryable by this fetcher")]
    UnknownField { field: String },
}

/// Data writer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("Write rejected: {reason}")]
    Rejected { reason: String },

    #[error("Record not found: {key}")]
    NotFound { key: String },

    #[error("Record already exists: {key}")]
    Conflict { key: String },
}

/// Cancellation and deadline errors surfaced by collaborators.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

/// Master error type for all datarepo errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataRepoError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),
}

impl DataRepoError {
    /// Construction-time failure; the repository was never returned.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// The caller asked for a field with no registered index.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Failure reported by a store, fetcher, writer, or the request context.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Fetch(_) | Self::Write(_) | Self::Context(_)
        )
    }

    pub fn missing_collaborator(collaborator: impl Into<String>) -> Self {
        Self::Config(ConfigError::MissingCollaborator {
            collaborator: collaborator.into(),
        })
    }

    pub fn undefined_cache(field: impl Into<String>) -> Self {
        Self::Dispatch(DispatchError::UndefinedCache {
            field: field.into(),
        })
    }
}

/// Result type alias for datarepo operations.
pub type DataRepoResult<T> = Result<T, DataRepoError>;

// =============================================================================
// TESTS
// =============================================================================
