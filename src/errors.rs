//! Error types for the fairdice game core
//!
//! Every failure a caller can observe maps to one stable classification code.
//! Messages never carry an active server seed.

/// Failures surfaced by the roll, seed and settlement operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Malformed or out-of-range bet or seed input. Never mutates state.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient balance: bet of {required} cents exceeds available {available} cents")]
    InsufficientBalance { required: u64, available: u64 },

    /// Unknown account or rotation hash
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reveal requested for a seed that is still active
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Storage could not commit. Callers must treat a retry as a brand-new roll.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl GameError {
    /// Stable classification code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "VALIDATION_ERROR",
            GameError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            GameError::NotFound(_) => "NOT_FOUND",
            GameError::Forbidden(_) => "FORBIDDEN",
            GameError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        GameError::Validation(msg.into())
    }
}

/// Storage backend errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// The stored state moved under the caller (stale nonce or seed generation)
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => GameError::NotFound(what),
            other => GameError::Persistence(other.to_string()),
        }
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::LoadFailed(e.to_string())
    }
}

// Convenience type aliases for Results
pub type DiceResult<T> = Result<T, GameError>;
pub type StoreResult<T> = Result<T, StoreError>;
