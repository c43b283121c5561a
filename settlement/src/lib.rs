//! Field Settlement Core
//!
//! Propagates cash injections through the relationship graph, locks
//! settled value into redeemable instruments and derives protocol
//! health from the ledger.
//!
//! # Architecture
//!
//! ```text
//! inject ──▶ PropagationEngine ──traverse──▶ RelationshipGraph
//!                    │
//!                    ▼ append_batch
//!                  Ledger ◀── Store / Redeem / Burn / Cancel ── InstrumentEngine
//!                    │                                              ▲
//!                    ▼                                              │ reserve ratio
//!              MetricsEngine ───────────────────────────────────────┘
//! ```
//!
//! Every operation is one atomic ledger commit; the conservation law
//! `inflow == routed + stored + pooled + burned` holds after each one.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{NodeId, ProtocolConfig};
//! use rust_decimal::Decimal;
//! use settlement::Protocol;
//! use std::sync::Arc;
//!
//! fn main() -> settlement::Result<()> {
//!     let protocol = Protocol::with_system_clock(Arc::new(ProtocolConfig::default()))?;
//!
//!     let (a, b) = (NodeId::new("a"), NodeId::new("b"));
//!     protocol.register_node(a.clone());
//!     protocol.register_node(b.clone());
//!     protocol.form_bond(&a, &b)?;
//!
//!     let receipt = protocol.inject(&a, Decimal::from(100))?;
//!     println!("settled {} to {} nodes",
//!              receipt.allocation.settled(), receipt.allocation.settlements.len());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod health;
pub mod instrument;
pub mod propagation;
pub mod protocol;

// Re-exports
pub use actor::{spawn_protocol_actor, ProtocolHandle};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use health::{HealthReport, MetricsEngine, Status};
pub use instrument::{instrument_id, Instrument, InstrumentEngine, InstrumentState, Portfolio};
pub use propagation::{Allocation, InjectionReceipt, PropagationEngine, Settlement};
pub use protocol::{Protocol, ProtocolState};
