//! Error types for the relationship graph

use crate::types::BondState;
use chrono::{DateTime, Utc};
use ledger_core::NodeId;
use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Graph errors
///
/// Every error leaves the graph unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node cannot bond with itself
    #[error("Node {0} cannot bond with itself")]
    SelfBond(NodeId),

    /// Endpoint already holds the maximum number of active bonds
    #[error("Node {node} is saturated ({max} active bonds)")]
    Saturated {
        /// Saturated endpoint
        node: NodeId,
        /// Configured limit
        max: u8,
    },

    /// Endpoint formed or reactivated a bond too recently
    #[error("Node {node} is cooling down until {until}")]
    Cooldown {
        /// Endpoint in cooldown
        node: NodeId,
        /// Earliest instant a new bond is allowed
        until: DateTime<Utc>,
    },

    /// No active bond for the pair
    #[error("No active bond between {0} and {1}")]
    NotFound(NodeId, NodeId),

    /// Node was never registered
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The pair already has an active bond
    #[error("Bond between {0} and {1} is already active")]
    AlreadyBonded(NodeId, NodeId),

    /// Configured limits cannot be applied (e.g. a cooldown past the
    /// representable time range)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Bond state machine refused a transition
    #[error("Invalid bond transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state
        from: BondState,
        /// Requested state
        to: BondState,
    },
}
