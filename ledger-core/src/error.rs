//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Conservation law or non-negativity broken by a staged commit.
    ///
    /// Indicates a logic defect upstream; the ledger halts after reporting it.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Ledger refuses mutations after an invariant violation
    #[error("Ledger halted after invariant violation: {0}")]
    Halted(String),

    /// Malformed event (missing subject, negative amount, clock regression, ...)
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// No unsealed events to put in an anchor block
    #[error("No events to seal since sequence {0}")]
    EmptyBlock(u64),

    /// Protocol configuration rejected at load time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Journal encoding error
    #[error("Journal error: {0}")]
    Json(#[from] serde_json::Error),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the consistency assertion that must stop further processing
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }
}
