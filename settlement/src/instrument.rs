//! Stored-value instruments
//!
//! An instrument locks part of a holder's settled balance. It ends in
//! exactly one terminal state: redeemed through a payout channel, or
//! cancelled with a friction burn.
//!
//! ```text
//! Active ──redeem(Gold)───▶ RedeemedGold
//!    │  ──redeem(Stable)─▶ RedeemedStable
//!    └───cancel─────────▶ Cancelled
//! ```
//!
//! Redemption is gated by the reserve covenant: below the critical
//! reserve ratio every redemption fails closed.

use crate::{
    health::{MetricsEngine, Status},
    propagation::{check_amount, quantize},
    Error, Result,
};
use chrono::{DateTime, Utc};
use field_graph::RelationshipGraph;
use ledger_core::{
    crypto, InstrumentId, Ledger, NodeId, PendingEvent, ProtocolConfig, RedemptionChannel,
    Reference,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Hex digits of the digest kept in an instrument id
const ID_DIGEST_LEN: usize = 24;

/// Instrument lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentState {
    /// Locked and redeemable
    Active,
    /// Paid out in physical metal
    RedeemedGold,
    /// Paid out in stablecoin
    RedeemedStable,
    /// Cancelled with friction
    Cancelled,
}

impl InstrumentState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstrumentState::Active)
    }
}

impl From<RedemptionChannel> for InstrumentState {
    fn from(channel: RedemptionChannel) -> Self {
        match channel {
            RedemptionChannel::Gold => InstrumentState::RedeemedGold,
            RedemptionChannel::Stable => InstrumentState::RedeemedStable,
        }
    }
}

/// Stored-value certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Content-addressed id
    pub id: InstrumentId,
    /// Holder
    pub holder: NodeId,
    /// Locked amount
    pub amount: Decimal,
    /// Locking rate
    pub rate: Decimal,
    /// Mint time (part of the id)
    pub minted_at: DateTime<Utc>,
    /// Current state
    pub state: InstrumentState,
    /// Redemption or cancellation time
    pub closed_at: Option<DateTime<Utc>>,
    /// Value burned on cancellation
    pub burned: Option<Decimal>,
}

/// Deterministic instrument id
///
/// `HC-` followed by the first 24 uppercase hex digits of the SHA-256 of
/// `holder|amount|unix_seconds|rate`, amounts and rates rendered with
/// exactly eight fractional digits.
pub fn instrument_id(
    holder: &NodeId,
    amount: Decimal,
    minted_at: DateTime<Utc>,
    rate: Decimal,
) -> InstrumentId {
    let canonical = format!(
        "{}|{}|{}|{}",
        holder,
        fixed8(amount),
        minted_at.timestamp(),
        fixed8(rate)
    );
    let digest = crypto::sha256_hex(&canonical).to_uppercase();
    InstrumentId::new(format!("HC-{}", &digest[..ID_DIGEST_LEN]))
}

fn fixed8(value: Decimal) -> String {
    let mut value = quantize(value, 8);
    value.rescale(8);
    value.to_string()
}

/// Per-state summary of a holder's instruments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Holder
    pub holder: Option<NodeId>,
    /// Active count and locked total
    pub active: (usize, Decimal),
    /// Redeemed count and paid-out total
    pub redeemed: (usize, Decimal),
    /// Cancelled count and burned total
    pub cancelled: (usize, Decimal),
}

/// Instrument engine
#[derive(Debug)]
pub struct InstrumentEngine {
    config: Arc<ProtocolConfig>,
    instruments: BTreeMap<InstrumentId, Instrument>,
}

impl InstrumentEngine {
    /// Create new instrument engine
    pub fn new(config: Arc<ProtocolConfig>) -> Self {
        Self {
            config,
            instruments: BTreeMap::new(),
        }
    }

    /// Lock `amount` of `holder`'s available balance into a new instrument
    #[allow(clippy::too_many_arguments)]
    pub fn mint(
        &mut self,
        graph: &RelationshipGraph,
        ledger: &mut Ledger,
        holder: &NodeId,
        amount: Decimal,
        rate: Decimal,
        minted_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<InstrumentId> {
        check_amount(amount, &self.config.numeric)?;
        let minimum = self.config.instruments.min_amount;
        if amount < minimum {
            return Err(Error::BelowMinimum { amount, minimum });
        }
        if rate <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!("rate {} is not positive", rate)));
        }
        if !graph.contains(holder) {
            return Err(Error::UnknownNode(holder.clone()));
        }

        let id = instrument_id(holder, amount, minted_at, rate);
        if self.instruments.contains_key(&id) {
            return Err(Error::DuplicateInstrument(id));
        }

        let available = ledger.balance_of(holder);
        if available < amount {
            return Err(Error::InsufficientBalance {
                holder: holder.clone(),
                available,
                requested: amount,
            });
        }

        ledger.append(
            PendingEvent::store(holder.clone(), amount, Reference::Instrument(id.clone())),
            at,
        )?;

        self.instruments.insert(
            id.clone(),
            Instrument {
                id: id.clone(),
                holder: holder.clone(),
                amount,
                rate,
                minted_at,
                state: InstrumentState::Active,
                closed_at: None,
                burned: None,
            },
        );

        tracing::info!(instrument = %id, holder = %holder, amount = %amount, "Instrument minted");
        Ok(id)
    }

    /// Redeem an active instrument through `channel`
    ///
    /// Returns the amount paid out.
    pub fn redeem(
        &mut self,
        ledger: &mut Ledger,
        metrics: &MetricsEngine,
        id: &InstrumentId,
        channel: RedemptionChannel,
        at: DateTime<Utc>,
    ) -> Result<Decimal> {
        let instrument = self.active(id)?;

        let reserve = metrics.reserve_ratio(ledger, at);
        if let Some(ratio) = reserve.ratio {
            if reserve.blocked {
                tracing::warn!(
                    instrument = %id,
                    ratio = %ratio,
                    "Redemption blocked by reserve covenant"
                );
                return Err(Error::CovenantBlocked {
                    ratio,
                    critical: self.config.metrics.reserve_critical,
                });
            }
            if reserve.status != Status::Healthy {
                tracing::warn!(instrument = %id, ratio = %ratio, "Redeeming under reserve pressure");
            }
        }

        let (holder, amount) = (instrument.holder.clone(), instrument.amount);
        ledger.append(
            PendingEvent::redeem(holder, amount, channel, Reference::Instrument(id.clone())),
            at,
        )?;
        self.close(id, channel.into(), at, None);

        tracing::info!(instrument = %id, ?channel, amount = %amount, "Instrument redeemed");
        Ok(amount)
    }

    /// Cancel an active instrument, burning the friction
    ///
    /// Returns the amount returned to the holder's available balance.
    pub fn cancel(
        &mut self,
        ledger: &mut Ledger,
        id: &InstrumentId,
        at: DateTime<Utc>,
    ) -> Result<Decimal> {
        let instrument = self.active(id)?;
        let holder = instrument.holder.clone();
        let locked = instrument.amount;

        let burned = quantize(
            locked * self.config.instruments.cancel_friction,
            self.config.numeric.amount_scale,
        );
        let returned = locked - burned;

        let reference = Reference::Instrument(id.clone());
        let mut batch = vec![PendingEvent::burn(
            Some(holder.clone()),
            burned,
            reference.clone(),
        )];
        if returned > Decimal::ZERO {
            batch.push(PendingEvent::cancel_return(holder, returned, reference));
        }
        ledger.append_batch(batch, at)?;
        self.close(id, InstrumentState::Cancelled, at, Some(burned));

        tracing::info!(
            instrument = %id,
            burned = %burned,
            returned = %returned,
            "Instrument cancelled"
        );
        Ok(returned)
    }

    /// Look up an instrument
    pub fn get(&self, id: &InstrumentId) -> Option<&Instrument> {
        self.instruments.get(id)
    }

    /// All instruments, ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> + '_ {
        self.instruments.values()
    }

    /// Summarise a holder's instruments by state
    pub fn portfolio(&self, holder: &NodeId) -> Portfolio {
        let mut portfolio = Portfolio {
            holder: Some(holder.clone()),
            ..Portfolio::default()
        };

        for instrument in self.iter().filter(|i| &i.holder == holder) {
            let (count, total, value) = match instrument.state {
                InstrumentState::Active => (
                    &mut portfolio.active.0,
                    &mut portfolio.active.1,
                    instrument.amount,
                ),
                InstrumentState::RedeemedGold | InstrumentState::RedeemedStable => (
                    &mut portfolio.redeemed.0,
                    &mut portfolio.redeemed.1,
                    instrument.amount,
                ),
                InstrumentState::Cancelled => (
                    &mut portfolio.cancelled.0,
                    &mut portfolio.cancelled.1,
                    instrument.burned.unwrap_or(Decimal::ZERO),
                ),
            };
            *count += 1;
            *total += value;
        }

        portfolio
    }

    fn active(&self, id: &InstrumentId) -> Result<&Instrument> {
        let instrument = self
            .instruments
            .get(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        if instrument.state.is_terminal() {
            return Err(Error::NotActive {
                id: id.clone(),
                state: instrument.state,
            });
        }
        Ok(instrument)
    }

    fn close(
        &mut self,
        id: &InstrumentId,
        state: InstrumentState,
        at: DateTime<Utc>,
        burned: Option<Decimal>,
    ) {
        if let Some(instrument) = self.instruments.get_mut(id) {
            instrument.state = state;
            instrument.closed_at = Some(at);
            instrument.burned = burned;
        }
    }
}
