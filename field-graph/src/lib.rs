//! Field Relationship Graph
//!
//! Bounded-degree undirected graph of participant nodes and the bonds
//! between them. Propagation reads its topology from here.
//!
//! # Invariants
//!
//! - At most one bond record per unordered pair
//! - Every node's active-bond count stays within `[0, max_bonds]`
//! - Traversal crosses `Active` bonds only
//! - Bond records are never deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod graph;
pub mod traverse;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use graph::RelationshipGraph;
pub use traverse::Traversal;
pub use types::{Bond, BondId, BondKey, BondState, Node, NodeState};
