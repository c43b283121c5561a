//! Error types for the settlement core

use crate::instrument::InstrumentState;
use ledger_core::{InstrumentId, NodeId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
///
/// Every mutating operation is all-or-nothing: whatever the error, no
/// ledger event was appended and no graph state changed.
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Relationship graph error
    #[error("Graph error: {0}")]
    Graph(#[from] field_graph::Error),

    /// Instrument amount under the configured floor
    #[error("Amount {amount} is below the minimum of {minimum}")]
    BelowMinimum {
        /// Requested amount
        amount: Decimal,
        /// Configured floor
        minimum: Decimal,
    },

    /// No such instrument
    #[error("Instrument not found: {0}")]
    NotFound(InstrumentId),

    /// Instrument already reached a terminal state
    #[error("Instrument {id} is not active ({state:?})")]
    NotActive {
        /// Instrument
        id: InstrumentId,
        /// Its terminal state
        state: InstrumentState,
    },

    /// Reserve ratio below the critical threshold; redemption paused
    #[error("Redemption blocked: reserve ratio {ratio} below {critical}")]
    CovenantBlocked {
        /// Current reserve ratio
        ratio: Decimal,
        /// Critical threshold
        critical: Decimal,
    },

    /// Holder's available balance cannot cover the lock
    #[error("Insufficient balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Holder
        holder: NodeId,
        /// Available (settled, unlocked) balance
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// An instrument with the same content-addressed id already exists
    #[error("Instrument already exists: {0}")]
    DuplicateInstrument(InstrumentId),

    /// Non-positive amount or rate, or more precision than the amount scale
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Node never registered with the graph
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Service configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Actor mailbox closed or reply dropped
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat error taxonomy for callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Node tried to bond with itself
    SelfBond,
    /// Degree limit reached
    Saturated,
    /// Bond cooldown not elapsed
    Cooldown,
    /// Missing bond or instrument
    NotFound,
    /// Instrument under the floor
    BelowMinimum,
    /// Instrument already terminal
    NotActive,
    /// Reserve covenant refused a redemption
    CovenantBlocked,
    /// Configuration rejected
    InvalidConfiguration,
    /// Ledger consistency assertion failed
    InvariantViolation,
    /// Ledger refuses mutations until investigated
    Halted,
    /// Unregistered node
    UnknownNode,
    /// Pair already bonded
    AlreadyBonded,
    /// Bond state machine refused a transition
    InvalidTransition,
    /// Holder cannot cover a lock
    InsufficientBalance,
    /// Instrument id already taken
    DuplicateInstrument,
    /// Malformed amount, rate or event
    InvalidInput,
    /// IO, encoding, signature or actor plumbing
    Internal,
}

impl ErrorKind {
    /// Expected business outcome rather than a fault
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, ErrorKind::CovenantBlocked)
    }

    /// Condition that must stop further mutations until investigated
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::InvariantViolation | ErrorKind::Halted)
    }
}

impl Error {
    /// Classify into the flat taxonomy
    pub fn kind(&self) -> ErrorKind {
        use field_graph::Error as G;
        use ledger_core::Error as L;

        match self {
            Error::Ledger(L::InvariantViolation(_)) => ErrorKind::InvariantViolation,
            Error::Ledger(L::Halted(_)) => ErrorKind::Halted,
            Error::Ledger(L::InvalidConfiguration(_))
            | Error::Graph(G::Configuration(_))
            | Error::Config(_) => ErrorKind::InvalidConfiguration,
            Error::Ledger(L::InvalidEvent(_)) | Error::InvalidAmount(_) => ErrorKind::InvalidInput,
            Error::Ledger(_) | Error::Io(_) | Error::Concurrency(_) => ErrorKind::Internal,

            Error::Graph(G::SelfBond(_)) => ErrorKind::SelfBond,
            Error::Graph(G::Saturated { .. }) => ErrorKind::Saturated,
            Error::Graph(G::Cooldown { .. }) => ErrorKind::Cooldown,
            Error::Graph(G::NotFound(..)) | Error::NotFound(_) => ErrorKind::NotFound,
            Error::Graph(G::UnknownNode(_)) | Error::UnknownNode(_) => ErrorKind::UnknownNode,
            Error::Graph(G::AlreadyBonded(..)) => ErrorKind::AlreadyBonded,
            Error::Graph(G::InvalidTransition { .. }) => ErrorKind::InvalidTransition,

            Error::BelowMinimum { .. } => ErrorKind::BelowMinimum,
            Error::NotActive { .. } => ErrorKind::NotActive,
            Error::CovenantBlocked { .. } => ErrorKind::CovenantBlocked,
            Error::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Error::DuplicateInstrument(_) => ErrorKind::DuplicateInstrument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covenant_is_business_outcome() {
        let err = Error::CovenantBlocked {
            ratio: Decimal::new(5, 1),
            critical: Decimal::ONE,
        };
        assert_eq!(err.kind(), ErrorKind::CovenantBlocked);
        assert!(err.kind().is_business_outcome());
        assert!(!err.kind().is_fatal());
    }

    #[test]
    fn test_invariant_violation_is_fatal() {
        let err = Error::from(ledger_core::Error::InvariantViolation("x".into()));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(err.kind().is_fatal());
        assert!(!err.kind().is_business_outcome());
    }

    #[test]
    fn test_graph_errors_flatten() {
        let node = NodeId::new("a");
        let err = Error::from(field_graph::Error::SelfBond(node.clone()));
        assert_eq!(err.kind(), ErrorKind::SelfBond);

        let err = Error::from(field_graph::Error::NotFound(node.clone(), node));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::from(field_graph::Error::Configuration("cooldown".into()));
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert!(!err.kind().is_fatal());
    }
}
