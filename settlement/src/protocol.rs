//! Transaction facade over the shared protocol state
//!
//! Graph, ledger and instrument registry live behind one
//! `parking_lot::RwLock`. Every mutating call holds the write lock for
//! its whole transaction, so at most one mutation is in flight and a
//! failure leaves nothing visible. Reads share the read lock and always
//! observe a state between two commits.

use crate::{
    health::{ChurnReport, FlowReport, HealthReport, MetricsEngine, ReserveReport, VelocityReport},
    instrument::{Instrument, InstrumentEngine, Portfolio},
    propagation::{Allocation, InjectionReceipt, PropagationEngine},
    Result,
};
use field_graph::{BondId, RelationshipGraph};
use ledger_core::{
    AnchorBlock, Clock, GrossTotals, InstrumentId, KeyPair, Ledger, LedgerEvent, NodeId,
    ProtocolConfig, RedemptionChannel, SystemClock, Totals,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Everything a transaction may touch
#[derive(Debug)]
pub struct ProtocolState {
    /// Relationship graph
    pub graph: RelationshipGraph,
    /// Conservation ledger
    pub ledger: Ledger,
    /// Instrument registry
    pub instruments: InstrumentEngine,
}

/// Settlement core
pub struct Protocol {
    config: Arc<ProtocolConfig>,
    clock: Arc<dyn Clock>,
    propagation: PropagationEngine,
    metrics: MetricsEngine,
    state: RwLock<ProtocolState>,
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .finish_non_exhaustive()
    }
}

impl Protocol {
    /// Create a protocol with an empty graph and ledger
    pub fn new(config: Arc<ProtocolConfig>, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_ledger(config, clock, Ledger::new())
    }

    /// Create a protocol on the system clock
    pub fn with_system_clock(config: Arc<ProtocolConfig>) -> Result<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Create a protocol around an existing ledger (e.g. one with metrics attached)
    pub fn with_ledger(
        config: Arc<ProtocolConfig>,
        clock: Arc<dyn Clock>,
        ledger: Ledger,
    ) -> Result<Self> {
        config.validate()?;

        let state = ProtocolState {
            graph: RelationshipGraph::new(config.clone()),
            ledger,
            instruments: InstrumentEngine::new(config.clone()),
        };

        Ok(Self {
            propagation: PropagationEngine::new(config.clone()),
            metrics: MetricsEngine::new(config.clone()),
            config,
            clock,
            state: RwLock::new(state),
        })
    }

    /// Protocol constants
    pub fn config(&self) -> &Arc<ProtocolConfig> {
        &self.config
    }

    /// Run `f` against a consistent snapshot
    pub fn read<R>(&self, f: impl FnOnce(&ProtocolState) -> R) -> R {
        f(&self.state.read())
    }

    // ===== Graph =====

    /// Register a node; `false` if it already exists
    pub fn register_node(&self, id: NodeId) -> bool {
        let mut state = self.state.write();
        let at = self.clock.now();
        state.graph.add_node(id, at)
    }

    /// Form (or reactivate) the bond between `a` and `b`
    pub fn form_bond(&self, a: &NodeId, b: &NodeId) -> Result<BondId> {
        let mut state = self.state.write();
        let at = self.clock.now();
        Ok(state.graph.form_bond(a, b, at)?)
    }

    /// Deactivate the bond between `a` and `b`
    pub fn dissolve_bond(&self, a: &NodeId, b: &NodeId) -> Result<BondId> {
        let mut state = self.state.write();
        let at = self.clock.now();
        Ok(state.graph.dissolve_bond(a, b, at)?)
    }

    /// Active bonds of a node
    pub fn bonds_of(&self, node: &NodeId) -> BTreeSet<BondId> {
        self.state.read().graph.bonds_of(node)
    }

    /// Breadth-first walk from `origin`, collected under one read lock
    ///
    /// Use [`Protocol::read`] to consume the lazy traversal directly.
    pub fn traverse(&self, origin: &NodeId, max_depth: u32) -> Vec<(NodeId, u32)> {
        self.read(|state| {
            state
                .graph
                .traverse(origin, max_depth)
                .map(|(node, hop)| (node.clone(), hop))
                .collect()
        })
    }

    // ===== Propagation =====

    /// Allocation an injection would produce right now
    pub fn preview(&self, origin: &NodeId, amount: Decimal) -> Result<Allocation> {
        let state = self.state.read();
        self.propagation.preview(&state.graph, origin, amount)
    }

    /// Inject `amount` at `origin` and propagate it
    pub fn inject(&self, origin: &NodeId, amount: Decimal) -> Result<InjectionReceipt> {
        let mut state = self.state.write();
        let at = self.clock.now();
        let ProtocolState { graph, ledger, .. } = &mut *state;
        self.propagation.inject(graph, ledger, origin, amount, at)
    }

    // ===== Instruments =====

    /// Lock part of `holder`'s balance into a new instrument
    ///
    /// The mint time is the clock's current instant, so an identical
    /// request within the same second maps to the same id and is
    /// rejected as a duplicate.
    pub fn mint(&self, holder: &NodeId, amount: Decimal, rate: Decimal) -> Result<InstrumentId> {
        let mut state = self.state.write();
        let at = self.clock.now();
        let ProtocolState {
            graph,
            ledger,
            instruments,
        } = &mut *state;
        instruments.mint(graph, ledger, holder, amount, rate, at, at)
    }

    /// Redeem an instrument through an external channel
    pub fn redeem(&self, id: &InstrumentId, channel: RedemptionChannel) -> Result<Decimal> {
        let mut state = self.state.write();
        let at = self.clock.now();
        let ProtocolState {
            ledger,
            instruments,
            ..
        } = &mut *state;
        instruments.redeem(ledger, &self.metrics, id, channel, at)
    }

    /// Cancel an instrument, burning the friction
    pub fn cancel(&self, id: &InstrumentId) -> Result<Decimal> {
        let mut state = self.state.write();
        let at = self.clock.now();
        let ProtocolState {
            ledger,
            instruments,
            ..
        } = &mut *state;
        instruments.cancel(ledger, id, at)
    }

    /// Instrument snapshot
    pub fn instrument(&self, id: &InstrumentId) -> Option<Instrument> {
        self.state.read().instruments.get(id).cloned()
    }

    /// Holder's instruments grouped by state
    pub fn portfolio(&self, holder: &NodeId) -> Portfolio {
        self.state.read().instruments.portfolio(holder)
    }

    // ===== Ledger =====

    /// Net positions
    pub fn totals(&self) -> Totals {
        self.state.read().ledger.totals()
    }

    /// Gross per-kind sums
    pub fn gross_totals(&self) -> GrossTotals {
        self.state.read().ledger.gross_totals()
    }

    /// Settled, unlocked balance of a node
    pub fn balance_of(&self, node: &NodeId) -> Decimal {
        self.state.read().ledger.balance_of(node)
    }

    /// Events after `sequence`, collected under one read lock
    pub fn events_since(&self, sequence: u64) -> Vec<LedgerEvent> {
        self.state
            .read()
            .ledger
            .events_since(sequence)
            .cloned()
            .collect()
    }

    /// Seal the events since the last block into an anchor block
    pub fn seal_block(&self, signer: Option<&KeyPair>) -> Result<AnchorBlock> {
        let mut state = self.state.write();
        let at = self.clock.now();
        Ok(state.ledger.seal_block(at, signer)?)
    }

    /// Lift a ledger halt after investigation
    pub fn resume(&self) {
        self.state.write().ledger.resume();
    }

    // ===== Metrics =====

    /// Reserve ratio
    pub fn reserve_ratio(&self) -> ReserveReport {
        let state = self.state.read();
        self.metrics.reserve_ratio(&state.ledger, self.clock.now())
    }

    /// Flow efficiency
    pub fn flow_efficiency(&self) -> FlowReport {
        self.metrics.flow_efficiency(&self.state.read().ledger)
    }

    /// Churn pressure
    pub fn churn_pressure(&self) -> ChurnReport {
        let state = self.state.read();
        self.metrics
            .churn_pressure(&state.ledger, &state.graph, self.clock.now())
    }

    /// Energy velocity
    pub fn energy_velocity(&self) -> VelocityReport {
        let state = self.state.read();
        self.metrics.energy_velocity(&state.ledger, self.clock.now())
    }

    /// All metrics plus node-state distribution
    pub fn health(&self) -> HealthReport {
        let state = self.state.read();
        self.metrics
            .health(&state.ledger, &state.graph, self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ledger_core::ManualClock;

    fn n(id: &str) -> NodeId {
        NodeId::new(id)
    }

    #[test]
    fn test_facade_round_trip() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let protocol =
            Protocol::new(Arc::new(ProtocolConfig::default()), clock.clone()).unwrap();

        assert!(protocol.register_node(n("a")));
        assert!(protocol.register_node(n("b")));
        assert!(!protocol.register_node(n("a")));
        protocol.form_bond(&n("a"), &n("b")).unwrap();

        let receipt = protocol.inject(&n("a"), Decimal::from(100)).unwrap();
        assert_eq!(protocol.balance_of(&n("b")), Decimal::new(225, 1));
        assert_eq!(protocol.events_since(0).len(), receipt.events.len());
        assert!(protocol.totals().is_balanced());

        clock.advance(Duration::seconds(1));
        let id = protocol
            .mint(&n("b"), Decimal::from(10), Decimal::ONE)
            .unwrap();
        assert_eq!(protocol.portfolio(&n("b")).active.0, 1);

        let returned = protocol.cancel(&id).unwrap();
        assert_eq!(returned, Decimal::new(98, 1));
        assert_eq!(protocol.churn_pressure().cancellations, 1);
    }

    #[test]
    fn test_read_gives_lazy_traversal() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let protocol =
            Protocol::new(Arc::new(ProtocolConfig::default()), clock.clone()).unwrap();
        for id in ["a", "b", "c"] {
            protocol.register_node(n(id));
        }
        protocol.form_bond(&n("a"), &n("b")).unwrap();
        assert_eq!(
            protocol.form_bond(&n("b"), &n("c")).unwrap_err().kind(),
            crate::ErrorKind::Cooldown
        );
        clock.advance(Duration::hours(25));
        protocol.form_bond(&n("b"), &n("c")).unwrap();

        let first_two = protocol.read(|state| {
            state
                .graph
                .traverse(&n("a"), 15)
                .take(2)
                .map(|(node, _)| node.clone())
                .collect::<Vec<_>>()
        });
        assert_eq!(first_two, vec![n("a"), n("b")]);
        assert_eq!(protocol.traverse(&n("a"), 1).len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ProtocolConfig::default();
        config.entry_split.buffer = Decimal::ZERO;
        let err = Protocol::with_system_clock(Arc::new(config)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidConfiguration);
    }
}
