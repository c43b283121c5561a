//! Protocol health metrics
//!
//! Four read-only ratios derived from the ledger and graph:
//!
//! | metric          | formula                                      |
//! |-----------------|----------------------------------------------|
//! | reserve ratio   | liquid treasury / redemption demand (window) |
//! | flow efficiency | (routed + stored + pooled) / inflow          |
//! | churn pressure  | cancellations (window) / active nodes        |
//! | energy velocity | routed volume (window) / stored              |
//!
//! Only the reserve ratio gates a state transition (redemption).

use chrono::{DateTime, Duration, Utc};
use field_graph::{NodeState, RelationshipGraph};
use ledger_core::{EventKind, Ledger, LedgerEvent, ProtocolConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Traffic-light status of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Within target
    Healthy,
    /// Under pressure
    Warning,
    /// Outside tolerance
    Critical,
}

/// Reserve ratio report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveReport {
    /// Liquidity, treasury surplus and liquidity-depth pool balances
    pub liquid_treasury: Decimal,
    /// Redeemed volume inside the demand window
    pub redemption_demand: Decimal,
    /// `None` when there is no demand (unbounded)
    pub ratio: Option<Decimal>,
    /// Status band
    pub status: Status,
    /// Ratio below the critical threshold; redemptions refused
    pub blocked: bool,
}

/// Flow efficiency report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    /// Net inflow
    pub inflow: Decimal,
    /// Routed + stored + pooled
    pub productive: Decimal,
    /// `None` before the first injection
    pub ratio: Option<Decimal>,
    /// Healthy at or above target, warning below
    pub status: Status,
}

/// Churn pressure report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnReport {
    /// Cancellations inside the churn window
    pub cancellations: u64,
    /// Nodes with at least one active bond
    pub active_nodes: u64,
    /// `None` when no node is active
    pub ratio: Option<Decimal>,
    /// Status band
    pub status: Status,
}

/// Energy velocity report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityReport {
    /// Routed volume inside the velocity window
    pub transfer_volume: Decimal,
    /// Value locked in active instruments
    pub stored: Decimal,
    /// `None` when nothing is stored
    pub ratio: Option<Decimal>,
    /// Healthy at or above target, warning below
    pub status: Status,
}

/// All metrics plus the node-state distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Evaluation time
    pub at: DateTime<Utc>,
    /// Reserve ratio
    pub reserve: ReserveReport,
    /// Flow efficiency
    pub flow: FlowReport,
    /// Churn pressure
    pub churn: ChurnReport,
    /// Energy velocity
    pub velocity: VelocityReport,
    /// Registered nodes per connectivity state
    pub node_states: BTreeMap<NodeState, usize>,
    /// Registered nodes
    pub total_nodes: usize,
    /// Ledger events
    pub event_count: usize,
}

impl HealthReport {
    /// Worst status across the four metrics
    pub fn overall(&self) -> Status {
        [
            self.reserve.status,
            self.flow.status,
            self.churn.status,
            self.velocity.status,
        ]
        .into_iter()
        .max()
        .unwrap_or(Status::Healthy)
    }
}

/// Metrics engine (stateless)
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    config: Arc<ProtocolConfig>,
}

impl MetricsEngine {
    /// Create new metrics engine
    pub fn new(config: Arc<ProtocolConfig>) -> Self {
        Self { config }
    }

    /// Reserve ratio as of `at`
    pub fn reserve_ratio(&self, ledger: &Ledger, at: DateTime<Utc>) -> ReserveReport {
        let thresholds = &self.config.metrics;

        let liquid_treasury: Decimal = ledger
            .pool_balances()
            .iter()
            .filter(|(pool, _)| pool.is_liquid_reserve())
            .map(|(_, balance)| *balance)
            .sum();

        let redemption_demand: Decimal =
            window(ledger, EventKind::Redeem, at, thresholds.redemption_window_days)
                .map(|e| e.amount)
                .sum();

        let ratio = liquid_treasury.checked_div(redemption_demand);
        let (status, blocked) = match ratio {
            None => (Status::Healthy, false),
            Some(r) => {
                let status = if r >= thresholds.reserve_healthy {
                    Status::Healthy
                } else if r >= thresholds.reserve_warning {
                    Status::Warning
                } else {
                    Status::Critical
                };
                (status, r < thresholds.reserve_critical)
            }
        };

        ReserveReport {
            liquid_treasury,
            redemption_demand,
            ratio,
            status,
            blocked,
        }
    }

    /// Share of net inflow that sits in routed, stored or pooled value
    pub fn flow_efficiency(&self, ledger: &Ledger) -> FlowReport {
        let totals = ledger.totals();
        let productive = totals.routed + totals.stored + totals.pooled;
        let ratio = productive.checked_div(totals.inflow);

        let status = match ratio {
            Some(r) if r < self.config.metrics.flow_efficiency_target => Status::Warning,
            _ => Status::Healthy,
        };

        FlowReport {
            inflow: totals.inflow,
            productive,
            ratio,
            status,
        }
    }

    /// Recent cancellations per active node
    pub fn churn_pressure(
        &self,
        ledger: &Ledger,
        graph: &RelationshipGraph,
        at: DateTime<Utc>,
    ) -> ChurnReport {
        let thresholds = &self.config.metrics;

        // one burn per cancellation, even when nothing is returned
        let cancellations = window(ledger, EventKind::Burn, at, thresholds.churn_window_days)
            .count() as u64;
        let active_nodes = graph.active_node_count() as u64;

        let ratio = Decimal::from(cancellations).checked_div(Decimal::from(active_nodes));
        let status = match ratio {
            Some(r) if r >= thresholds.churn_warning => Status::Critical,
            Some(r) if r >= thresholds.churn_healthy => Status::Warning,
            _ => Status::Healthy,
        };

        ChurnReport {
            cancellations,
            active_nodes,
            ratio,
            status,
        }
    }

    /// Recent routed volume relative to locked value
    pub fn energy_velocity(&self, ledger: &Ledger, at: DateTime<Utc>) -> VelocityReport {
        let thresholds = &self.config.metrics;

        let transfer_volume: Decimal =
            window(ledger, EventKind::Route, at, thresholds.velocity_window_days)
                .map(|e| e.amount)
                .sum();
        let stored = ledger.totals().stored;
        let ratio = transfer_volume.checked_div(stored);

        let status = match ratio {
            Some(r) if r < thresholds.velocity_target => Status::Warning,
            _ => Status::Healthy,
        };

        VelocityReport {
            transfer_volume,
            stored,
            ratio,
            status,
        }
    }

    /// Full health snapshot
    pub fn health(
        &self,
        ledger: &Ledger,
        graph: &RelationshipGraph,
        at: DateTime<Utc>,
    ) -> HealthReport {
        let mut node_states = BTreeMap::new();
        for node in graph.nodes() {
            *node_states
                .entry(node.state(ledger.has_settled(&node.id)))
                .or_insert(0) += 1;
        }

        HealthReport {
            at,
            reserve: self.reserve_ratio(ledger, at),
            flow: self.flow_efficiency(ledger),
            churn: self.churn_pressure(ledger, graph, at),
            velocity: self.energy_velocity(ledger, at),
            node_states,
            total_nodes: graph.node_count(),
            event_count: ledger.event_count(),
        }
    }
}

/// Events of `kind` stamped within `days` before `at`
fn window<'l>(
    ledger: &'l Ledger,
    kind: EventKind,
    at: DateTime<Utc>,
    days: i64,
) -> impl Iterator<Item = &'l LedgerEvent> + 'l {
    let since = Duration::try_days(days)
        .and_then(|span| at.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    ledger
        .events()
        .iter()
        .filter(move |e| e.kind == kind && e.timestamp >= since && e.timestamp <= at)
}
