//! Hop-decayed propagation of injected value
//!
//! An injection is split into five entry buckets. The propagation bucket
//! walks the relationship graph outward from the origin; every node at hop
//! `h >= 1` shares the hop's budget `propagation * 1/2^h` evenly with the
//! other nodes at that hop. Whatever the walk does not settle is absorbed
//! into the four absorption pools. The other four entry buckets go
//! straight to their pools.
//!
//! # Example
//!
//! ```text
//! inject 100 at A, bonds A-B, B-C, entry split 45/20/15/10/10
//!
//!   Inflow   A                 100
//!   Route    B  (hop 1, 1/2)    22.5
//!   Route    C  (hop 2, 1/4)    11.25
//!   Pool     stability           4.5       40% of 11.25 unsettled
//!   Pool     liquidity depth     2.8125    25%
//!   Pool     intelligence        2.25      20%
//!   Pool     compliance          1.6875    remainder
//!   Pool     liquidity          20
//!   Pool     treasury surplus   15
//!   Pool     infrastructure     10
//!   Pool     buffer             10         remainder
//! ```
//!
//! Every fraction is rounded toward zero at the amount scale and the
//! rounding dust is swept into the last bucket of its split, so the
//! events of one injection always sum back to the inflow exactly.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use field_graph::RelationshipGraph;
use ledger_core::{
    config::NumericConfig, Ledger, LedgerEvent, NodeId, PendingEvent, PoolKind, ProtocolConfig,
    Reference,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One node's propagation settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Recipient
    pub node: NodeId,
    /// Distance from the origin
    pub hop: u32,
    /// Hop decay weight `1/2^hop`
    pub weight: Decimal,
    /// Amount settled
    pub amount: Decimal,
}

/// Full breakdown of one injection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Injection origin
    pub origin: NodeId,
    /// Injected amount
    pub total: Decimal,
    /// Propagation bucket of the entry split
    pub propagation: Decimal,
    /// Non-propagating entry buckets, in split order
    pub entry_pools: Vec<(PoolKind, Decimal)>,
    /// Route settlements, in traversal order
    pub settlements: Vec<Settlement>,
    /// Absorption of the unsettled propagation share, in split order
    pub absorption: Vec<(PoolKind, Decimal)>,
}

impl Allocation {
    /// Sum of route settlements
    pub fn settled(&self) -> Decimal {
        self.settlements.iter().map(|s| s.amount).sum()
    }

    /// Unsettled propagation share
    pub fn absorbed(&self) -> Decimal {
        self.propagation - self.settled()
    }

    /// Everything sent to pools
    pub fn pooled(&self) -> Decimal {
        self.entry_pools
            .iter()
            .chain(self.absorption.iter())
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Deepest hop that received a settlement
    pub fn max_hop(&self) -> u32 {
        self.settlements.iter().map(|s| s.hop).max().unwrap_or(0)
    }
}

/// Result of a committed injection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionReceipt {
    /// Reference carried by every event of the injection
    pub injection_id: Uuid,
    /// Breakdown
    pub allocation: Allocation,
    /// Committed events, in ledger order
    pub events: Vec<LedgerEvent>,
}

/// Propagation engine
#[derive(Debug, Clone)]
pub struct PropagationEngine {
    config: Arc<ProtocolConfig>,
}

impl PropagationEngine {
    /// Create new propagation engine
    pub fn new(config: Arc<ProtocolConfig>) -> Self {
        Self { config }
    }

    /// Compute the allocation without writing anything
    pub fn preview(
        &self,
        graph: &RelationshipGraph,
        origin: &NodeId,
        amount: Decimal,
    ) -> Result<Allocation> {
        self.allocate(graph, origin, amount)
    }

    /// Allocate and commit an injection as one atomic ledger batch
    pub fn inject(
        &self,
        graph: &RelationshipGraph,
        ledger: &mut Ledger,
        origin: &NodeId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<InjectionReceipt> {
        let allocation = self.allocate(graph, origin, amount)?;
        let injection_id = Uuid::now_v7();
        let batch = plan(&allocation, Reference::Injection(injection_id));

        let events = ledger.append_batch(batch, at)?;

        tracing::info!(
            injection = %injection_id,
            origin = %origin,
            amount = %amount,
            settled = %allocation.settled(),
            absorbed = %allocation.absorbed(),
            recipients = allocation.settlements.len(),
            "Injection committed"
        );

        Ok(InjectionReceipt {
            injection_id,
            allocation,
            events,
        })
    }

    fn allocate(
        &self,
        graph: &RelationshipGraph,
        origin: &NodeId,
        amount: Decimal,
    ) -> Result<Allocation> {
        let scale = self.config.numeric.amount_scale;
        check_amount(amount, &self.config.numeric)?;
        if !graph.contains(origin) {
            return Err(Error::UnknownNode(origin.clone()));
        }

        let split = &self.config.entry_split;
        let mut entry = split_exact(
            amount,
            &[
                split.propagation,
                split.liquidity,
                split.surplus,
                split.infrastructure,
                split.buffer,
            ],
            scale,
        )
        .into_iter();
        let propagation = entry.next().unwrap_or(Decimal::ZERO);
        let entry_pools: Vec<(PoolKind, Decimal)> = [
            PoolKind::Liquidity,
            PoolKind::TreasurySurplus,
            PoolKind::Infrastructure,
            PoolKind::Buffer,
        ]
        .into_iter()
        .zip(entry)
        .collect();

        let settlements = self.settle(graph, origin, propagation)?;
        let settled: Decimal = settlements.iter().map(|s| s.amount).sum();

        let absorption_split = &self.config.absorption_split;
        let absorption = [
            PoolKind::Stability,
            PoolKind::LiquidityDepth,
            PoolKind::Intelligence,
            PoolKind::Compliance,
        ]
        .into_iter()
        .zip(split_exact(
            propagation - settled,
            &[
                absorption_split.stability,
                absorption_split.liquidity,
                absorption_split.intelligence,
                absorption_split.compliance,
            ],
            scale,
        ))
        .collect();

        Ok(Allocation {
            origin: origin.clone(),
            total: amount,
            propagation,
            entry_pools,
            settlements,
            absorption,
        })
    }

    /// Walk the graph and settle each hop's budget across its nodes
    fn settle(
        &self,
        graph: &RelationshipGraph,
        origin: &NodeId,
        propagation: Decimal,
    ) -> Result<Vec<Settlement>> {
        let scale = self.config.numeric.amount_scale;
        let weight_scale = self.config.numeric.weight_scale;

        // hop -> nodes, ascending id; hop 0 is the origin and receives nothing.
        // Every node past hop 0 was reached over an active bond, so nodes
        // without active bonds never appear here.
        let mut levels: Vec<Vec<&NodeId>> = Vec::new();
        for (node, hop) in graph.traverse(origin, self.config.field.max_hops) {
            if hop == 0 {
                continue;
            }
            let index = hop as usize - 1;
            if levels.len() <= index {
                levels.resize_with(index + 1, Vec::new);
            }
            levels[index].push(node);
        }

        let mut settlements = Vec::new();
        let mut remaining = propagation;

        for (index, nodes) in levels.iter().enumerate() {
            let hop = index as u32 + 1;
            let weight = decay_weight(hop, weight_scale);
            let share = quantize(
                propagation * weight / Decimal::from(nodes.len() as u64),
                scale,
            );
            if share.is_zero() {
                continue;
            }

            for node in nodes {
                if share > remaining {
                    continue;
                }
                remaining -= share;
                settlements.push(Settlement {
                    node: (*node).clone(),
                    hop,
                    weight,
                    amount: share,
                });
            }
        }

        if remaining.is_sign_negative() {
            return Err(Error::Ledger(ledger_core::Error::InvariantViolation(format!(
                "propagation over-settled by {}",
                -remaining
            ))));
        }
        Ok(settlements)
    }
}

/// Turn an allocation into the ledger batch of one injection
///
/// Zero-valued entries produce no event.
pub fn plan(allocation: &Allocation, reference: Reference) -> Vec<PendingEvent> {
    let mut batch = vec![PendingEvent::inflow(
        allocation.origin.clone(),
        allocation.total,
        reference.clone(),
    )];

    batch.extend(allocation.settlements.iter().map(|s| {
        PendingEvent::route(s.node.clone(), s.amount, s.hop, reference.clone())
    }));

    batch.extend(
        allocation
            .absorption
            .iter()
            .chain(allocation.entry_pools.iter())
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(pool, amount)| PendingEvent::pool(*pool, *amount, reference.clone())),
    );

    batch
}

/// `1/2^hop`, rounded toward zero at `scale` digits
pub fn decay_weight(hop: u32, scale: u32) -> Decimal {
    match 1u64.checked_shl(hop) {
        Some(denominator) => quantize(Decimal::ONE / Decimal::from(denominator), scale),
        None => Decimal::ZERO,
    }
}

/// Round toward zero at `scale` fractional digits
pub(crate) fn quantize(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Reject non-positive amounts, amounts above the configured maximum and
/// amounts finer than the amount scale
pub(crate) fn check_amount(amount: Decimal, numeric: &NumericConfig) -> Result<()> {
    let scale = numeric.amount_scale;
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!("{} is not positive", amount)));
    }
    if amount > numeric.max_amount {
        return Err(Error::InvalidAmount(format!(
            "{} exceeds the maximum of {}",
            amount, numeric.max_amount
        )));
    }
    if amount.normalize().scale() > scale {
        return Err(Error::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            amount, scale
        )));
    }
    Ok(())
}

/// Split `amount` by `fractions`, rounding each part toward zero and
/// sweeping the dust into the last part
fn split_exact(amount: Decimal, fractions: &[Decimal], scale: u32) -> Vec<Decimal> {
    let mut parts: Vec<Decimal> = fractions
        .iter()
        .map(|fraction| quantize(amount * *fraction, scale))
        .collect();

    let assigned: Decimal = parts.iter().sum();
    if let Some(last) = parts.last_mut() {
        *last += amount - assigned;
    }
    parts
}
