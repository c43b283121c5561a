//! Append-only value ledger
//!
//! The ordered event sequence is the only ground truth. Totals, node
//! balances and pool balances are a cache folded from it, and
//! [`Ledger::replay`] rebuilds that cache from any persisted sequence.
//!
//! Every mutation goes through [`Ledger::append_batch`]: the batch is
//! staged against the current aggregate, checked for non-negative
//! positions and the conservation law, and only then committed. A failed
//! batch leaves the ledger exactly as it was.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use ledger_core::{Ledger, NodeId, PendingEvent, PoolKind, Reference};
//! use rust_decimal::Decimal;
//! use uuid::Uuid;
//!
//! let mut ledger = Ledger::new();
//! let reference = Reference::Injection(Uuid::now_v7());
//! let origin = NodeId::new("alice");
//!
//! ledger
//!     .append_batch(
//!         vec![
//!             PendingEvent::inflow(origin, Decimal::from(100), reference.clone()),
//!             PendingEvent::pool(PoolKind::Buffer, Decimal::from(100), reference),
//!         ],
//!         Utc::now(),
//!     )
//!     .unwrap();
//!
//! assert!(ledger.totals().is_balanced());
//! ```

use crate::{
    anchor::AnchorBlock,
    crypto::{hash_event, merkle_root, KeyPair},
    metrics::LedgerMetrics,
    types::{EventKind, GrossTotals, LedgerEvent, NodeId, PendingEvent, PoolKind, Totals},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Main ledger
#[derive(Debug, Default)]
pub struct Ledger {
    /// Ordered event history; `events[i].sequence == i + 1`
    events: Vec<LedgerEvent>,

    /// Net positions
    totals: Totals,

    /// Per-kind sums
    gross: GrossTotals,

    /// Available (settled, unlocked) balance per node
    balances: HashMap<NodeId, Decimal>,

    /// Balance per pool
    pools: BTreeMap<PoolKind, Decimal>,

    /// Nodes that have been an inflow origin or a route recipient
    settled: HashSet<NodeId>,

    /// Last commit number used
    last_commit: u64,

    /// Sealed anchor blocks
    blocks: Vec<AnchorBlock>,

    /// Set after an invariant violation
    halted: Option<String>,

    /// Optional Prometheus counters
    metrics: Option<LedgerMetrics>,
}

/// Aggregate changes of one batch, not yet visible
struct Stage<'a> {
    base: &'a Ledger,
    totals: Totals,
    gross: GrossTotals,
    balances: HashMap<NodeId, Decimal>,
    pools: BTreeMap<PoolKind, Decimal>,
    settled: Vec<NodeId>,
}

impl<'a> Stage<'a> {
    fn new(base: &'a Ledger) -> Self {
        Self {
            base,
            totals: base.totals,
            gross: base.gross,
            balances: HashMap::new(),
            pools: BTreeMap::new(),
            settled: Vec::new(),
        }
    }

    fn balance_mut(&mut self, node: &NodeId) -> &mut Decimal {
        let base = self.base.balance_of(node);
        self.balances.entry(node.clone()).or_insert(base)
    }

    fn credit(&mut self, node: &NodeId, amount: Decimal) -> Option<()> {
        let balance = self.balance_mut(node);
        *balance = balance.checked_add(amount)?;
        Some(())
    }

    fn debit(&mut self, node: &NodeId, amount: Decimal) -> Option<()> {
        let balance = self.balance_mut(node);
        *balance = balance.checked_sub(amount)?;
        Some(())
    }

    fn apply(&mut self, event: &PendingEvent) -> Result<()> {
        validate_shape(event)?;

        let overflow = || {
            Error::InvalidEvent(format!(
                "{:?} amount {} overflows the ledger positions",
                event.kind, event.amount
            ))
        };

        self.totals
            .apply(event.kind, event.amount)
            .ok_or_else(overflow)?;
        self.gross
            .apply(event.kind, event.amount)
            .ok_or_else(overflow)?;

        match (event.kind, event.subject.as_ref()) {
            (EventKind::Inflow, Some(node)) => self.settled.push(node.clone()),
            (EventKind::Route, Some(node)) => {
                self.credit(node, event.amount).ok_or_else(overflow)?;
                self.settled.push(node.clone());
            }
            (EventKind::Store, Some(node)) => self.debit(node, event.amount).ok_or_else(overflow)?,
            (EventKind::Cancel, Some(node)) => {
                self.credit(node, event.amount).ok_or_else(overflow)?
            }
            _ => {}
        }

        if let (EventKind::Pool, Some(pool)) = (event.kind, event.pool) {
            let base = self.base.pool_balance(pool);
            let balance = self.pools.entry(pool).or_insert(base);
            *balance = balance.checked_add(event.amount).ok_or_else(overflow)?;
        }

        Ok(())
    }

    /// Conservation law and non-negativity over the staged aggregate
    fn check(&self) -> Result<()> {
        if let Some(bucket) = self.totals.negative_bucket() {
            return Err(Error::InvariantViolation(format!(
                "{} position would become negative",
                bucket
            )));
        }

        if let Some((node, balance)) = self
            .balances
            .iter()
            .find(|(_, b)| b.is_sign_negative() && !b.is_zero())
        {
            return Err(Error::InvariantViolation(format!(
                "balance of {} would become {}",
                node, balance
            )));
        }

        if !self.totals.is_balanced() {
            return Err(Error::InvariantViolation(format!(
                "inflow {} != routed {} + stored {} + pooled {} + burned {} (discrepancy {})",
                self.totals.inflow,
                self.totals.routed,
                self.totals.stored,
                self.totals.pooled,
                self.totals.burned,
                self.totals.discrepancy()
            )));
        }

        Ok(())
    }
}

fn validate_shape(event: &PendingEvent) -> Result<()> {
    if event.amount.is_sign_negative() && !event.amount.is_zero() {
        return Err(Error::InvalidEvent(format!(
            "{:?} amount {} is negative",
            event.kind, event.amount
        )));
    }
    if event.kind.requires_subject() && event.subject.is_none() {
        return Err(Error::InvalidEvent(format!(
            "{:?} event requires a subject node",
            event.kind
        )));
    }
    if event.kind == EventKind::Pool && event.pool.is_none() {
        return Err(Error::InvalidEvent("Pool event requires a pool".to_string()));
    }
    if event.kind == EventKind::Redeem && event.channel.is_none() {
        return Err(Error::InvalidEvent(
            "Redeem event requires a payout channel".to_string(),
        ));
    }
    Ok(())
}

impl Ledger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach Prometheus counters
    pub fn with_metrics(mut self, metrics: LedgerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Rebuild a ledger from a persisted event sequence
    ///
    /// Sequences must be contiguous from 1, commit numbers must increase
    /// by one per batch, timestamps must not go backwards, and the
    /// conservation law must hold at every commit boundary.
    pub fn replay(events: impl IntoIterator<Item = LedgerEvent>) -> Result<Self> {
        let mut ledger = Ledger::new();
        let mut group: Vec<LedgerEvent> = Vec::new();

        for event in events {
            let expected = ledger.last_sequence() + group.len() as u64 + 1;
            if event.sequence != expected {
                return Err(Error::InvalidEvent(format!(
                    "sequence gap: expected {}, found {}",
                    expected, event.sequence
                )));
            }

            if group.first().map_or(false, |first| first.commit != event.commit) {
                ledger.replay_commit(std::mem::take(&mut group))?;
            }
            group.push(event);
        }

        if !group.is_empty() {
            ledger.replay_commit(group)?;
        }

        tracing::debug!(events = ledger.event_count(), "Ledger replayed");
        Ok(ledger)
    }

    fn replay_commit(&mut self, group: Vec<LedgerEvent>) -> Result<()> {
        let commit = group[0].commit;
        if commit != self.last_commit + 1 {
            return Err(Error::InvalidEvent(format!(
                "commit gap: expected {}, found {}",
                self.last_commit + 1,
                commit
            )));
        }

        let mut previous = self.last_timestamp();
        for event in &group {
            if previous.map_or(false, |p| event.timestamp < p) {
                return Err(Error::InvalidEvent(format!(
                    "timestamp regression at sequence {}",
                    event.sequence
                )));
            }
            previous = Some(event.timestamp);
        }

        let mut stage = Stage::new(self);
        for event in &group {
            stage.apply(&pending_of(event))?;
        }
        stage.check()?;

        let (totals, gross, balances, pools, settled) = into_parts(stage);
        self.merge(totals, gross, balances, pools, settled);
        self.last_commit = commit;
        self.events.extend(group);
        Ok(())
    }

    /// Append a single event as its own commit
    pub fn append(&mut self, event: PendingEvent, at: DateTime<Utc>) -> Result<u64> {
        let committed = self.append_batch(vec![event], at)?;
        Ok(committed[0].sequence)
    }

    /// Atomically append a batch of events
    ///
    /// On any error nothing is appended. An invariant violation
    /// additionally halts the ledger until [`Ledger::resume`].
    pub fn append_batch(
        &mut self,
        batch: Vec<PendingEvent>,
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>> {
        if let Some(reason) = &self.halted {
            return Err(Error::Halted(reason.clone()));
        }

        match self.stage_and_commit(batch, at) {
            Ok(committed) => Ok(committed),
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection();
                }
                if let Error::InvariantViolation(reason) = &e {
                    tracing::error!(%reason, "Invariant violation; halting ledger");
                    self.halted = Some(reason.clone());
                } else {
                    tracing::warn!(error = %e, "Ledger batch rejected");
                }
                Err(e)
            }
        }
    }

    fn stage_and_commit(
        &mut self,
        batch: Vec<PendingEvent>,
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>> {
        if batch.is_empty() {
            return Err(Error::InvalidEvent("empty batch".to_string()));
        }
        if let Some(last) = self.last_timestamp() {
            if at < last {
                return Err(Error::InvalidEvent(format!(
                    "timestamp {} precedes last event at {}",
                    at, last
                )));
            }
        }

        let mut stage = Stage::new(self);
        for event in &batch {
            stage.apply(event)?;
        }
        stage.check()?;

        let (totals, gross, balances, pools, settled) = into_parts(stage);
        self.merge(totals, gross, balances, pools, settled);

        let commit = self.last_commit + 1;
        let first_sequence = self.last_sequence() + 1;
        let committed: Vec<LedgerEvent> = batch
            .into_iter()
            .enumerate()
            .map(|(i, pending)| LedgerEvent {
                sequence: first_sequence + i as u64,
                commit,
                kind: pending.kind,
                amount: pending.amount,
                subject: pending.subject,
                pool: pending.pool,
                hop: pending.hop,
                channel: pending.channel,
                reference: pending.reference,
                timestamp: at,
            })
            .collect();

        self.last_commit = commit;
        self.events.extend(committed.iter().cloned());

        if let Some(metrics) = &self.metrics {
            metrics.record_commit(committed.len());
        }
        tracing::debug!(commit, events = committed.len(), "Ledger commit");

        Ok(committed)
    }

    fn merge(
        &mut self,
        totals: Totals,
        gross: GrossTotals,
        balances: HashMap<NodeId, Decimal>,
        pools: BTreeMap<PoolKind, Decimal>,
        settled: Vec<NodeId>,
    ) {
        self.totals = totals;
        self.gross = gross;
        self.balances.extend(balances);
        self.pools.extend(pools);
        self.settled.extend(settled);
    }

    /// Net positions (conservation law buckets)
    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Plain per-kind sums
    pub fn gross_totals(&self) -> GrossTotals {
        self.gross
    }

    /// Events with sequence number greater than `sequence`, in order
    pub fn events_since(&self, sequence: u64) -> impl Iterator<Item = &LedgerEvent> + '_ {
        let start = usize::try_from(sequence).unwrap_or(usize::MAX);
        self.events.iter().skip(start)
    }

    /// Full history
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Number of events appended
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Sequence of the newest event (0 when empty)
    pub fn last_sequence(&self) -> u64 {
        self.events.last().map_or(0, |e| e.sequence)
    }

    fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Available balance of a node
    pub fn balance_of(&self, node: &NodeId) -> Decimal {
        self.balances.get(node).copied().unwrap_or(Decimal::ZERO)
    }

    /// Balance of a pool
    pub fn pool_balance(&self, pool: PoolKind) -> Decimal {
        self.pools.get(&pool).copied().unwrap_or(Decimal::ZERO)
    }

    /// All non-empty pool balances
    pub fn pool_balances(&self) -> &BTreeMap<PoolKind, Decimal> {
        &self.pools
    }

    /// Whether a node has ever been an inflow origin or a route recipient
    pub fn has_settled(&self, node: &NodeId) -> bool {
        self.settled.contains(node)
    }

    /// Whether mutations are refused
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Reason for the halt, if halted
    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Accept mutations again after an operator has investigated a halt
    pub fn resume(&mut self) {
        if let Some(reason) = self.halted.take() {
            tracing::warn!(%reason, "Ledger resumed after halt");
        }
    }

    /// Seal every event since the previous block into a new anchor block
    pub fn seal_block(
        &mut self,
        at: DateTime<Utc>,
        signer: Option<&KeyPair>,
    ) -> Result<AnchorBlock> {
        let from = self.blocks.last().map_or(0, |b| b.last_sequence);
        let hashes = self
            .events_since(from)
            .map(hash_event)
            .collect::<Result<Vec<_>>>()?;

        if hashes.is_empty() {
            return Err(Error::EmptyBlock(from));
        }

        let (height, previous_hash) = match self.blocks.last() {
            Some(prev) => (prev.height + 1, prev.block_hash),
            None => (0, [0u8; 32]),
        };

        let block = AnchorBlock::seal(
            height,
            previous_hash,
            from + 1,
            self.last_sequence(),
            merkle_root(&hashes),
            at,
            signer,
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_block_sealed();
        }
        tracing::info!(
            height,
            events = block.event_count(),
            root = %block.merkle_root_hex(),
            "Anchor block sealed"
        );

        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Sealed blocks, oldest first
    pub fn blocks(&self) -> &[AnchorBlock] {
        &self.blocks
    }

    /// Recompute a block's Merkle root and header hash against the history
    pub fn verify_block(&self, block: &AnchorBlock) -> Result<bool> {
        if block.first_sequence == 0 || block.last_sequence > self.last_sequence() {
            return Ok(false);
        }

        let hashes = self
            .events_since(block.first_sequence - 1)
            .take_while(|e| e.sequence <= block.last_sequence)
            .map(hash_event)
            .collect::<Result<Vec<_>>>()?;

        Ok(merkle_root(&hashes) == block.merkle_root && block.compute_hash() == block.block_hash)
    }
}

type Parts = (
    Totals,
    GrossTotals,
    HashMap<NodeId, Decimal>,
    BTreeMap<PoolKind, Decimal>,
    Vec<NodeId>,
);

fn into_parts(stage: Stage<'_>) -> Parts {
    (
        stage.totals,
        stage.gross,
        stage.balances,
        stage.pools,
        stage.settled,
    )
}

fn pending_of(event: &LedgerEvent) -> PendingEvent {
    PendingEvent {
        kind: event.kind,
        amount: event.amount,
        subject: event.subject.clone(),
        pool: event.pool,
        hop: event.hop,
        channel: event.channel,
        reference: event.reference.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RedemptionChannel, Reference};
    use chrono::Duration;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn node(id: &str) -> NodeId {
        NodeId::new(id)
    }

    fn injection() -> Reference {
        Reference::Injection(Uuid::now_v7())
    }

    /// Inflow of 100 at `a`: 60 routed to `b`, 40 to the buffer pool
    fn seed(ledger: &mut Ledger, at: DateTime<Utc>) {
        let r = injection();
        ledger
            .append_batch(
                vec![
                    PendingEvent::inflow(node("a"), dec("100"), r.clone()),
                    PendingEvent::route(node("b"), dec("60"), 1, r.clone()),
                    PendingEvent::pool(PoolKind::Buffer, dec("40"), r),
                ],
                at,
            )
            .unwrap();
    }

    #[test]
    fn test_batch_commits_atomically() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);

        assert_eq!(ledger.event_count(), 3);
        assert_eq!(ledger.last_sequence(), 3);
        assert!(ledger.events().iter().all(|e| e.commit == 1 && e.timestamp == now));

        let totals = ledger.totals();
        assert_eq!(totals.inflow, dec("100"));
        assert_eq!(totals.routed, dec("60"));
        assert_eq!(totals.pooled, dec("40"));
        assert!(totals.is_balanced());

        assert_eq!(ledger.balance_of(&node("b")), dec("60"));
        assert_eq!(ledger.pool_balance(PoolKind::Buffer), dec("40"));
        assert!(ledger.has_settled(&node("a")));
        assert!(ledger.has_settled(&node("b")));
        assert!(!ledger.has_settled(&node("c")));
    }

    #[test]
    fn test_unbalanced_append_fails_closed() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);
        let before = ledger.totals();

        let err = ledger
            .append(PendingEvent::inflow(node("a"), dec("5"), injection()), now)
            .unwrap_err();

        assert!(err.is_invariant_violation());
        assert_eq!(ledger.totals(), before);
        assert_eq!(ledger.event_count(), 3);
        assert!(ledger.is_halted());
    }

    #[test]
    fn test_halted_ledger_refuses_until_resumed() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let _ = ledger.append(PendingEvent::inflow(node("a"), dec("1"), injection()), now);

        let r = injection();
        let balanced = vec![
            PendingEvent::inflow(node("a"), dec("1"), r.clone()),
            PendingEvent::pool(PoolKind::Buffer, dec("1"), r),
        ];
        assert!(matches!(
            ledger.append_batch(balanced.clone(), now),
            Err(Error::Halted(_))
        ));

        ledger.resume();
        assert!(ledger.append_batch(balanced, now).is_ok());
    }

    #[test]
    fn test_store_beyond_balance_is_violation() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);

        let cert = Reference::Instrument(crate::InstrumentId::new("HC-TEST"));
        let err = ledger
            .append(PendingEvent::store(node("b"), dec("60.01"), cert), now)
            .unwrap_err();

        assert!(err.is_invariant_violation());
        assert_eq!(ledger.balance_of(&node("b")), dec("60"));
    }

    #[test]
    fn test_store_redeem_cycle_stays_balanced() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);

        let cert = Reference::Instrument(crate::InstrumentId::new("HC-TEST"));
        ledger
            .append(PendingEvent::store(node("b"), dec("50"), cert.clone()), now)
            .unwrap();
        assert_eq!(ledger.balance_of(&node("b")), dec("10"));
        assert_eq!(ledger.totals().stored, dec("50"));

        ledger
            .append(
                PendingEvent::redeem(node("b"), dec("50"), RedemptionChannel::Gold, cert),
                now,
            )
            .unwrap();

        let totals = ledger.totals();
        assert_eq!(totals.stored, Decimal::ZERO);
        assert!(totals.is_balanced());
        assert_eq!(ledger.gross_totals().redeemed, dec("50"));
        // paid out externally, not back to the available balance
        assert_eq!(ledger.balance_of(&node("b")), dec("10"));
    }

    #[test]
    fn test_malformed_events_rejected_without_halt() {
        let mut ledger = Ledger::new();
        let now = Utc::now();

        let mut pool = PendingEvent::pool(PoolKind::Buffer, dec("1"), injection());
        pool.pool = None;
        assert!(matches!(
            ledger.append(pool, now),
            Err(Error::InvalidEvent(_))
        ));

        let negative = PendingEvent::route(node("x"), dec("-1"), 1, injection());
        assert!(matches!(
            ledger.append(negative, now),
            Err(Error::InvalidEvent(_))
        ));

        assert!(matches!(
            ledger.append_batch(vec![], now),
            Err(Error::InvalidEvent(_))
        ));
        assert!(!ledger.is_halted());
    }

    #[test]
    fn test_overflowing_batch_rejected_without_halt() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let r = injection();
        ledger
            .append_batch(
                vec![
                    PendingEvent::inflow(node("a"), Decimal::MAX, r.clone()),
                    PendingEvent::route(node("b"), Decimal::MAX, 1, r),
                ],
                now,
            )
            .unwrap();
        let before = ledger.totals();

        let r = injection();
        let err = ledger
            .append_batch(
                vec![
                    PendingEvent::inflow(node("a"), dec("1"), r.clone()),
                    PendingEvent::route(node("b"), dec("1"), 1, r),
                ],
                now,
            )
            .unwrap_err();

        assert!(matches!(err, Error::InvalidEvent(_)));
        assert!(!ledger.is_halted());
        assert_eq!(ledger.totals(), before);
        assert_eq!(ledger.event_count(), 2);
        assert_eq!(ledger.balance_of(&node("b")), Decimal::MAX);
    }

    #[test]
    fn test_timestamp_regression_rejected() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);

        let r = injection();
        let result = ledger.append_batch(
            vec![
                PendingEvent::inflow(node("a"), dec("1"), r.clone()),
                PendingEvent::pool(PoolKind::Buffer, dec("1"), r),
            ],
            now - Duration::seconds(1),
        );
        assert!(matches!(result, Err(Error::InvalidEvent(_))));
    }

    #[test]
    fn test_events_since_is_restartable() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);
        seed(&mut ledger, now);

        let all: Vec<u64> = ledger.events_since(0).map(|e| e.sequence).collect();
        assert_eq!(all, vec![1, 2, 3, 4, 5, 6]);

        let tail: Vec<u64> = ledger.events_since(4).map(|e| e.sequence).collect();
        assert_eq!(tail, vec![5, 6]);

        assert_eq!(ledger.events_since(6).count(), 0);
        assert_eq!(ledger.events_since(u64::MAX).count(), 0);
    }

    #[test]
    fn test_replay_rebuilds_same_aggregate() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);
        seed(&mut ledger, now + Duration::seconds(1));

        let replayed = Ledger::replay(ledger.events().to_vec()).unwrap();
        assert_eq!(replayed.totals(), ledger.totals());
        assert_eq!(replayed.gross_totals(), ledger.gross_totals());
        assert_eq!(replayed.balance_of(&node("b")), dec("120"));
        assert_eq!(replayed.pool_balance(PoolKind::Buffer), dec("80"));
    }

    #[test]
    fn test_replay_detects_gap_and_tampering() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        seed(&mut ledger, now);
        seed(&mut ledger, now);

        let mut gapped = ledger.events().to_vec();
        gapped.remove(1);
        assert!(matches!(
            Ledger::replay(gapped),
            Err(Error::InvalidEvent(_))
        ));

        let mut tampered = ledger.events().to_vec();
        tampered[1].amount = dec("59");
        assert!(matches!(
            Ledger::replay(tampered),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_seal_and_verify_blocks() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let key = KeyPair::from_seed(&[7u8; 32]);

        assert!(matches!(
            ledger.seal_block(now, None),
            Err(Error::EmptyBlock(0))
        ));

        seed(&mut ledger, now);
        let genesis = ledger.seal_block(now, Some(&key)).unwrap();
        assert_eq!(genesis.height, 0);
        assert_eq!((genesis.first_sequence, genesis.last_sequence), (1, 3));
        assert!(genesis.verify_signature(&key.public_key()).is_ok());
        assert!(ledger.verify_block(&genesis).unwrap());

        seed(&mut ledger, now);
        let next = ledger.seal_block(now, None).unwrap();
        assert_eq!(next.height, 1);
        assert_eq!(next.previous_hash, genesis.block_hash);
        assert_eq!(next.event_count(), 3);
        assert!(next.verify_signature(&key.public_key()).is_err());

        let mut forged = next.clone();
        forged.merkle_root = [9u8; 32];
        assert!(!ledger.verify_block(&forged).unwrap());
    }

    #[test]
    fn test_metrics_track_commits_and_rejections() {
        let metrics = LedgerMetrics::new().unwrap();
        let mut ledger = Ledger::new().with_metrics(metrics.clone());
        let now = Utc::now();

        seed(&mut ledger, now);
        let _ = ledger.append_batch(vec![], now);

        assert_eq!(metrics.commits_total.get(), 1);
        assert_eq!(metrics.events_total.get(), 3);
        assert_eq!(metrics.rejected_commits_total.get(), 1);
    }
}
