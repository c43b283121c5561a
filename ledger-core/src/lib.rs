//! Field Ledger Core
//!
//! Append-only event ledger for a closed-world value network, with
//! exact-decimal conservation checks and Merkle-anchored blocks.
//!
//! # Architecture
//!
//! - **Event Sourcing**: Totals and balances are folded from immutable events
//! - **Atomic Commits**: A batch is staged, checked, then applied in full or not at all
//! - **Merkle Anchoring**: Sealed blocks chain by hash and can be signed
//! - **Fail Closed**: An invariant violation halts the ledger
//!
//! # Invariants
//!
//! - Conservation: inflow == routed + stored + pooled + burned at every commit boundary
//! - Non-negativity: no bucket, node balance or pool balance goes below zero
//! - Deterministic replay: same events produce the same state
//! - Append-only: events are never modified or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod anchor;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod types;

// Re-exports
pub use anchor::AnchorBlock;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProtocolConfig;
pub use crypto::KeyPair;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::LedgerMetrics;
pub use types::{
    EventKind, GrossTotals, InstrumentId, LedgerEvent, NodeId, PendingEvent, PoolKind,
    RedemptionChannel, Reference, Totals,
};
