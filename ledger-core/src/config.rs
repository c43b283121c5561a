//! Protocol configuration
//!
//! Every constant the core depends on lives here. A config is validated
//! once, at load, and then shared read-only (`Arc<ProtocolConfig>`) with
//! every component constructor.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable protocol parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Relationship graph limits
    pub field: FieldConfig,

    /// Numeric policy
    pub numeric: NumericConfig,

    /// Split of every injection
    pub entry_split: EntrySplit,

    /// Split of the unsettled propagation remainder
    pub absorption_split: AbsorptionSplit,

    /// Instrument lifecycle
    pub instruments: InstrumentConfig,

    /// Health thresholds and windows
    pub metrics: MetricsConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            numeric: NumericConfig::default(),
            entry_split: EntrySplit::default(),
            absorption_split: AbsorptionSplit::default(),
            instruments: InstrumentConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Relationship graph limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Maximum active bonds per node
    pub max_bonds: u8,

    /// Hours a node must wait after forming/reactivating a bond
    pub bond_cooldown_hours: i64,

    /// Propagation horizon
    pub max_hops: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            max_bonds: 5,
            bond_cooldown_hours: 24,
            max_hops: 15,
        }
    }
}

/// Numeric policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericConfig {
    /// Fractional digits kept on every split amount
    pub amount_scale: u32,

    /// Fractional digits kept on hop decay weights
    pub weight_scale: u32,

    /// Largest amount a single injection or mint may carry
    pub max_amount: Decimal,
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            amount_scale: 8,
            weight_scale: 18,
            max_amount: Decimal::from(1_000_000_000_000_i64),
        }
    }
}

/// Split of every injection (must sum to exactly 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrySplit {
    /// Flows through bonds
    pub propagation: Decimal,
    /// Internal liquidity for redemption depth
    pub liquidity: Decimal,
    /// Surplus for treasury
    pub surplus: Decimal,
    /// Operations
    pub infrastructure: Decimal,
    /// Protocol buffer
    pub buffer: Decimal,
}

impl Default for EntrySplit {
    fn default() -> Self {
        Self {
            propagation: Decimal::new(45, 2),
            liquidity: Decimal::new(20, 2),
            surplus: Decimal::new(15, 2),
            infrastructure: Decimal::new(10, 2),
            buffer: Decimal::new(10, 2),
        }
    }
}

impl EntrySplit {
    fn fractions(&self) -> [(&'static str, Decimal); 5] {
        [
            ("propagation", self.propagation),
            ("liquidity", self.liquidity),
            ("surplus", self.surplus),
            ("infrastructure", self.infrastructure),
            ("buffer", self.buffer),
        ]
    }
}

/// Split of the absorbed remainder (must sum to exactly 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsorptionSplit {
    /// Long-term stability
    pub stability: Decimal,
    /// Network liquidity depth
    pub liquidity: Decimal,
    /// Protocol intelligence
    pub intelligence: Decimal,
    /// Compliance buffers
    pub compliance: Decimal,
}

impl Default for AbsorptionSplit {
    fn default() -> Self {
        Self {
            stability: Decimal::new(40, 2),
            liquidity: Decimal::new(25, 2),
            intelligence: Decimal::new(20, 2),
            compliance: Decimal::new(15, 2),
        }
    }
}

impl AbsorptionSplit {
    fn fractions(&self) -> [(&'static str, Decimal); 4] {
        [
            ("stability", self.stability),
            ("liquidity", self.liquidity),
            ("intelligence", self.intelligence),
            ("compliance", self.compliance),
        ]
    }
}

/// Instrument lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Smallest amount that can be minted
    pub min_amount: Decimal,

    /// Share of the locked amount burned on cancellation
    pub cancel_friction: Decimal,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::from(10),
            cancel_friction: Decimal::new(2, 2),
        }
    }
}

/// Health thresholds and windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Reserve ratio at or above which status is healthy
    pub reserve_healthy: Decimal,
    /// Reserve ratio at or above which status is warning
    pub reserve_warning: Decimal,
    /// Reserve ratio below which redemptions are blocked
    pub reserve_critical: Decimal,
    /// Days of redemption volume counted as demand
    pub redemption_window_days: i64,

    /// Flow efficiency target
    pub flow_efficiency_target: Decimal,

    /// Churn pressure below which status is healthy
    pub churn_healthy: Decimal,
    /// Churn pressure below which status is warning
    pub churn_warning: Decimal,
    /// Days of cancellations counted as churn
    pub churn_window_days: i64,

    /// Healthy circulation rate
    pub velocity_target: Decimal,
    /// Days of routed volume counted as transfers
    pub velocity_window_days: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            reserve_healthy: Decimal::from(3),
            reserve_warning: Decimal::new(15, 1),
            reserve_critical: Decimal::ONE,
            redemption_window_days: 30,
            flow_efficiency_target: Decimal::new(95, 2),
            churn_healthy: Decimal::new(2, 2),
            churn_warning: Decimal::new(5, 2),
            churn_window_days: 30,
            velocity_target: Decimal::new(3, 1),
            velocity_window_days: 7,
        }
    }
}

/// Largest scale a `Decimal` can carry
const MAX_SCALE: u32 = 28;

/// One year
pub const MAX_BOND_COOLDOWN_HOURS: i64 = 24 * 366;

/// Ten years
pub const MAX_WINDOW_DAYS: i64 = 3660;

/// Running totals stay representable for at least this many maximal amounts
const AMOUNT_HEADROOM: i64 = 1_000_000_000;

impl ProtocolConfig {
    /// Load from a TOML file and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProtocolConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfiguration(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `FIELD_*` environment variables, validated
    pub fn from_env() -> Result<Self> {
        let mut config = ProtocolConfig::default();

        if let Some(v) = env_parse::<u8>("FIELD_MAX_BONDS")? {
            config.field.max_bonds = v;
        }
        if let Some(v) = env_parse::<i64>("FIELD_BOND_COOLDOWN_HOURS")? {
            config.field.bond_cooldown_hours = v;
        }
        if let Some(v) = env_parse::<u32>("FIELD_MAX_HOPS")? {
            config.field.max_hops = v;
        }
        if let Some(v) = env_parse::<Decimal>("FIELD_CANCEL_FRICTION")? {
            config.instruments.cancel_friction = v;
        }
        if let Some(v) = env_parse::<Decimal>("FIELD_MIN_INSTRUMENT_AMOUNT")? {
            config.instruments.min_amount = v;
        }
        if let Some(v) = env_parse::<Decimal>("FIELD_MAX_AMOUNT")? {
            config.numeric.max_amount = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every split and bound with exact arithmetic
    pub fn validate(&self) -> Result<()> {
        check_split("entry split", &self.entry_split.fractions())?;
        check_split("absorption split", &self.absorption_split.fractions())?;

        if self.field.max_bonds == 0 {
            return Err(invalid("max_bonds must be positive"));
        }
        if self.field.bond_cooldown_hours < 0
            || self.field.bond_cooldown_hours > MAX_BOND_COOLDOWN_HOURS
        {
            return Err(invalid(format!(
                "bond_cooldown_hours must be in [0, {}]",
                MAX_BOND_COOLDOWN_HOURS
            )));
        }
        if self.field.max_hops == 0 {
            return Err(invalid("max_hops must be positive"));
        }
        // 1/2^h needs h fractional digits to be exact
        if self.field.max_hops > self.numeric.weight_scale {
            return Err(invalid(format!(
                "max_hops {} exceeds weight_scale {}",
                self.field.max_hops, self.numeric.weight_scale
            )));
        }
        if self.numeric.weight_scale > MAX_SCALE || self.numeric.amount_scale > MAX_SCALE {
            return Err(invalid(format!("scales must not exceed {}", MAX_SCALE)));
        }

        let max_amount = self.numeric.max_amount;
        let ceiling = Decimal::MAX / Decimal::from(AMOUNT_HEADROOM);
        if max_amount <= Decimal::ZERO || max_amount > ceiling {
            return Err(invalid(format!("max_amount must be in (0, {}]", ceiling)));
        }

        let inst = &self.instruments;
        if inst.min_amount <= Decimal::ZERO {
            return Err(invalid("instrument min_amount must be positive"));
        }
        if inst.min_amount > max_amount {
            return Err(invalid(format!(
                "instrument min_amount {} exceeds max_amount {}",
                inst.min_amount, max_amount
            )));
        }
        if inst.cancel_friction < Decimal::ZERO || inst.cancel_friction >= Decimal::ONE {
            return Err(invalid("cancel_friction must be in [0, 1)"));
        }

        let m = &self.metrics;
        if m.reserve_critical <= Decimal::ZERO
            || m.reserve_critical > m.reserve_warning
            || m.reserve_warning > m.reserve_healthy
        {
            return Err(invalid(
                "reserve thresholds must satisfy 0 < critical <= warning <= healthy",
            ));
        }
        if m.churn_healthy <= Decimal::ZERO || m.churn_healthy > m.churn_warning {
            return Err(invalid("churn thresholds must satisfy 0 < healthy <= warning"));
        }
        if m.flow_efficiency_target <= Decimal::ZERO || m.flow_efficiency_target > Decimal::ONE {
            return Err(invalid("flow_efficiency_target must be in (0, 1]"));
        }
        if m.velocity_target <= Decimal::ZERO {
            return Err(invalid("velocity_target must be positive"));
        }
        for days in [
            m.redemption_window_days,
            m.churn_window_days,
            m.velocity_window_days,
        ] {
            if days <= 0 || days > MAX_WINDOW_DAYS {
                return Err(invalid(format!(
                    "metric windows must be in [1, {}] days",
                    MAX_WINDOW_DAYS
                )));
            }
        }

        Ok(())
    }

    /// Bond cooldown as a duration
    pub fn bond_cooldown(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.field.bond_cooldown_hours).ok_or_else(|| {
            invalid(format!(
                "bond_cooldown_hours {} is out of range",
                self.field.bond_cooldown_hours
            ))
        })
    }
}

fn check_split(name: &str, fractions: &[(&'static str, Decimal)]) -> Result<()> {
    for (part, fraction) in fractions {
        if *fraction < Decimal::ZERO || *fraction > Decimal::ONE {
            return Err(invalid(format!(
                "{} fraction {} = {} outside [0, 1]",
                name, part, fraction
            )));
        }
    }

    let total: Decimal = fractions.iter().map(|(_, f)| *f).sum();
    if total != Decimal::ONE {
        return Err(invalid(format!("{} must sum to 1, got {}", name, total)));
    }
    Ok(())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfiguration(msg.into())
}
