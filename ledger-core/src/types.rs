//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for value)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Participant identity in the relationship graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create new node ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Content-addressed instrument identifier (`HC-XXXXXXXXXXXXXXXXXXXXXXXX`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Wrap an already rendered id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol pools that absorb value
///
/// The first four receive the fixed entry split of every injection; the
/// last four receive the absorbed remainder of the propagation share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PoolKind {
    /// Redemption depth
    Liquidity = 1,
    /// Surplus set aside for metal purchases
    TreasurySurplus = 2,
    /// Operations and hosting
    Infrastructure = 3,
    /// Protocol buffer
    Buffer = 4,
    /// Long-term stability (absorption)
    Stability = 5,
    /// Network liquidity depth (absorption)
    LiquidityDepth = 6,
    /// Protocol intelligence operations (absorption)
    Intelligence = 7,
    /// Compliance and audit buffers (absorption)
    Compliance = 8,
}

impl PoolKind {
    /// Pools counted as liquid treasury when computing the reserve ratio
    pub fn is_liquid_reserve(&self) -> bool {
        matches!(
            self,
            PoolKind::Liquidity | PoolKind::TreasurySurplus | PoolKind::LiquidityDepth
        )
    }

    /// Stable lowercase label
    pub fn label(&self) -> &'static str {
        match self {
            PoolKind::Liquidity => "liquidity",
            PoolKind::TreasurySurplus => "treasury_surplus",
            PoolKind::Infrastructure => "infrastructure",
            PoolKind::Buffer => "buffer",
            PoolKind::Stability => "stability",
            PoolKind::LiquidityDepth => "liquidity_depth",
            PoolKind::Intelligence => "intelligence",
            PoolKind::Compliance => "compliance",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POOL:{}", self.label())
    }
}

/// External payout channel of a redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedemptionChannel {
    /// Physical metal
    Gold,
    /// Stablecoin
    Stable,
}

/// Kind of value movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// Cash injected at an origin node
    Inflow = 1,
    /// Propagation share settled to a node
    Route = 2,
    /// Settled value locked into an instrument
    Store = 3,
    /// Value absorbed by a protocol pool
    Pool = 4,
    /// Value permanently destroyed (cancellation friction)
    Burn = 5,
    /// Locked value paid out through an external channel
    Redeem = 6,
    /// Locked value returned to the holder on cancellation
    Cancel = 7,
}

impl EventKind {
    /// Whether events of this kind must name a subject node
    pub fn requires_subject(&self) -> bool {
        !matches!(self, EventKind::Pool | EventKind::Burn)
    }
}

/// Operation that caused an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    /// Cash injection
    Injection(Uuid),
    /// Instrument lifecycle operation
    Instrument(InstrumentId),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Injection(id) => write!(f, "injection:{}", id),
            Reference::Instrument(id) => write!(f, "instrument:{}", id),
        }
    }
}

/// Event not yet appended (no sequence, commit or timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Kind of movement
    pub kind: EventKind,
    /// Amount moved (non-negative)
    pub amount: Decimal,
    /// Node the movement concerns
    pub subject: Option<NodeId>,
    /// Pool for `Pool` events
    pub pool: Option<PoolKind>,
    /// Hop distance for `Route` events
    pub hop: Option<u32>,
    /// Payout channel for `Redeem` events
    pub channel: Option<RedemptionChannel>,
    /// Causing operation
    pub reference: Reference,
}

impl PendingEvent {
    fn bare(kind: EventKind, amount: Decimal, reference: Reference) -> Self {
        Self {
            kind,
            amount,
            subject: None,
            pool: None,
            hop: None,
            channel: None,
            reference,
        }
    }

    /// Cash injected at `origin`
    pub fn inflow(origin: NodeId, amount: Decimal, reference: Reference) -> Self {
        Self {
            subject: Some(origin),
            ..Self::bare(EventKind::Inflow, amount, reference)
        }
    }

    /// Propagation share settled to `node` at distance `hop`
    pub fn route(node: NodeId, amount: Decimal, hop: u32, reference: Reference) -> Self {
        Self {
            subject: Some(node),
            hop: Some(hop),
            ..Self::bare(EventKind::Route, amount, reference)
        }
    }

    /// Value absorbed by `pool`
    pub fn pool(pool: PoolKind, amount: Decimal, reference: Reference) -> Self {
        Self {
            pool: Some(pool),
            ..Self::bare(EventKind::Pool, amount, reference)
        }
    }

    /// Value locked by `holder`
    pub fn store(holder: NodeId, amount: Decimal, reference: Reference) -> Self {
        Self {
            subject: Some(holder),
            ..Self::bare(EventKind::Store, amount, reference)
        }
    }

    /// Locked value paid out to `holder`
    pub fn redeem(
        holder: NodeId,
        amount: Decimal,
        channel: RedemptionChannel,
        reference: Reference,
    ) -> Self {
        Self {
            subject: Some(holder),
            channel: Some(channel),
            ..Self::bare(EventKind::Redeem, amount, reference)
        }
    }

    /// Cancellation friction destroyed from `holder`'s locked value
    pub fn burn(holder: Option<NodeId>, amount: Decimal, reference: Reference) -> Self {
        Self {
            subject: holder,
            ..Self::bare(EventKind::Burn, amount, reference)
        }
    }

    /// Locked value returned to `holder`
    pub fn cancel_return(holder: NodeId, amount: Decimal, reference: Reference) -> Self {
        Self {
            subject: Some(holder),
            ..Self::bare(EventKind::Cancel, amount, reference)
        }
    }
}

/// Immutable record of one value movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Monotonic sequence number, starting at 1
    pub sequence: u64,

    /// Atomic batch this event was appended in
    pub commit: u64,

    /// Kind of movement
    pub kind: EventKind,

    /// Amount moved (exact decimal, non-negative)
    pub amount: Decimal,

    /// Node the movement concerns (None for system-level pool/burn events)
    pub subject: Option<NodeId>,

    /// Pool for `Pool` events
    pub pool: Option<PoolKind>,

    /// Hop distance for `Route` events
    pub hop: Option<u32>,

    /// Payout channel for `Redeem` events
    pub channel: Option<RedemptionChannel>,

    /// Causing operation
    pub reference: Reference,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl LedgerEvent {
    /// Create canonical bytes for hashing
    pub fn canonical_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Net position of every unit of injected value
///
/// Produced by folding the event history; the conservation law is
/// `inflow == routed + stored + pooled + burned`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Value injected from outside
    pub inflow: Decimal,
    /// Value delivered to participants (available or paid out)
    pub routed: Decimal,
    /// Value locked in active instruments
    pub stored: Decimal,
    /// Value held by protocol pools
    pub pooled: Decimal,
    /// Value permanently destroyed
    pub burned: Decimal,
}

impl Totals {
    /// Sum of every categorized outflow, saturating at `Decimal::MAX`
    pub fn outflow(&self) -> Decimal {
        self.routed
            .saturating_add(self.stored)
            .saturating_add(self.pooled)
            .saturating_add(self.burned)
    }

    /// `routed + stored + pooled + burned`, `None` past `Decimal::MAX`
    pub fn checked_outflow(&self) -> Option<Decimal> {
        self.routed
            .checked_add(self.stored)?
            .checked_add(self.pooled)?
            .checked_add(self.burned)
    }

    /// `inflow - outflow`; zero when balanced
    pub fn discrepancy(&self) -> Decimal {
        self.inflow.saturating_sub(self.outflow())
    }

    /// Conservation law, exact comparison
    pub fn is_balanced(&self) -> bool {
        self.checked_outflow() == Some(self.inflow)
    }

    /// First bucket with a negative position, if any
    pub fn negative_bucket(&self) -> Option<&'static str> {
        [
            ("inflow", self.inflow),
            ("routed", self.routed),
            ("stored", self.stored),
            ("pooled", self.pooled),
            ("burned", self.burned),
        ]
        .into_iter()
        .find(|(_, v)| v.is_sign_negative() && !v.is_zero())
        .map(|(name, _)| name)
    }

    /// Fold one event; `None` (and no change) if a bucket would overflow
    pub(crate) fn apply(&mut self, kind: EventKind, amount: Decimal) -> Option<()> {
        let mut next = *self;
        match kind {
            EventKind::Inflow => next.inflow = next.inflow.checked_add(amount)?,
            EventKind::Route => next.routed = next.routed.checked_add(amount)?,
            EventKind::Pool => next.pooled = next.pooled.checked_add(amount)?,
            EventKind::Store => {
                next.routed = next.routed.checked_sub(amount)?;
                next.stored = next.stored.checked_add(amount)?;
            }
            EventKind::Redeem | EventKind::Cancel => {
                next.stored = next.stored.checked_sub(amount)?;
                next.routed = next.routed.checked_add(amount)?;
            }
            EventKind::Burn => {
                next.stored = next.stored.checked_sub(amount)?;
                next.burned = next.burned.checked_add(amount)?;
            }
        }
        *self = next;
        Some(())
    }
}

/// Plain per-kind sums over the full history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossTotals {
    /// Σ Inflow
    pub inflow: Decimal,
    /// Σ Route
    pub routed: Decimal,
    /// Σ Store
    pub stored: Decimal,
    /// Σ Pool
    pub pooled: Decimal,
    /// Σ Burn
    pub burned: Decimal,
    /// Σ Redeem
    pub redeemed: Decimal,
    /// Σ Cancel (returned to holders)
    pub returned: Decimal,
}

impl GrossTotals {
    pub(crate) fn apply(&mut self, kind: EventKind, amount: Decimal) -> Option<()> {
        let bucket = match kind {
            EventKind::Inflow => &mut self.inflow,
            EventKind::Route => &mut self.routed,
            EventKind::Store => &mut self.stored,
            EventKind::Pool => &mut self.pooled,
            EventKind::Burn => &mut self.burned,
            EventKind::Redeem => &mut self.redeemed,
            EventKind::Cancel => &mut self.returned,
        };
        *bucket = bucket.checked_add(amount)?;
        Some(())
    }
}
