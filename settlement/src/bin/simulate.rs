//! Settlement simulation binary
//!
//! Builds a random bounded-degree network on a manual clock, runs a few
//! injections and instrument lifecycles through it, then prints the
//! health report as JSON.
//!
//! ```text
//! field-simulate [--nodes N] [--seed S] [--journal events.jsonl] [--config field.toml]
//! ```
//!
//! Without `--config` (or `SETTLEMENT_CONFIG`) the configuration comes from
//! `FIELD_*` / `SETTLEMENT_*` environment variables.

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use clap::Parser;
use ledger_core::{journal, ManualClock, NodeId, RedemptionChannel};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rust_decimal::Decimal;
use settlement::{Config, Protocol};
use std::path::PathBuf;
use std::sync::Arc;

const BONDING_ROUNDS: usize = 6;
const INJECTIONS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "field-simulate")]
#[command(about = "Run a seeded settlement simulation and print the health report")]
struct Args {
    /// Number of nodes in the network
    #[arg(short, long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(2..))]
    nodes: u32,

    /// RNG seed for bonding and injection origins
    #[arg(short, long, default_value_t = 7)]
    seed: u64,

    /// Write the committed events as JSON lines
    #[arg(short, long)]
    journal: Option<PathBuf>,

    /// Service configuration file (TOML)
    #[arg(short, long, env = "SETTLEMENT_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let nodes = args.nodes as usize;
    let seed = args.seed;

    let config = match &args.config {
        Some(path) => {
            Config::from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::from_env()?,
    };
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        nodes,
        seed,
        "Starting simulation"
    );

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let protocol = Protocol::new(Arc::new(config.protocol), clock.clone())?;
    let mut rng = StdRng::seed_from_u64(seed);

    let ids: Vec<NodeId> = (0..nodes).map(|i| NodeId::new(format!("n{:04}", i))).collect();
    for id in &ids {
        protocol.register_node(id.clone());
    }

    // one attempt per node per round; cooldown allows one bond per node per round
    let mut bonds = 0usize;
    for _ in 0..BONDING_ROUNDS {
        for a in &ids {
            let b = &ids[rng.gen_range(0..nodes)];
            match protocol.form_bond(a, b) {
                Ok(_) => bonds += 1,
                Err(e) => tracing::debug!(error = %e, "Bond skipped"),
            }
        }
        clock.advance(protocol.config().bond_cooldown()? + Duration::hours(1));
    }
    tracing::info!(bonds, "Network formed");

    for _ in 0..INJECTIONS {
        let origin = &ids[rng.gen_range(0..nodes)];
        protocol.inject(origin, Decimal::from(1000))?;
        clock.advance(Duration::minutes(1));
    }

    let floor = protocol.config().instruments.min_amount;
    let mut minted = Vec::new();
    for id in &ids {
        if protocol.balance_of(id) >= floor {
            minted.push(protocol.mint(id, floor, Decimal::ONE)?);
            clock.advance(Duration::seconds(1));
        }
    }

    for (i, instrument) in minted.iter().enumerate() {
        let outcome = match i % 3 {
            0 => protocol.redeem(instrument, RedemptionChannel::Gold),
            1 => protocol.cancel(instrument),
            _ => continue,
        };
        if let Err(e) = outcome {
            if !e.kind().is_business_outcome() {
                return Err(e.into());
            }
            tracing::warn!(instrument = %instrument, error = %e, "Redemption refused");
        }
    }

    let totals = protocol.totals();
    if !totals.is_balanced() {
        bail!("ledger unbalanced by {}", totals.discrepancy());
    }

    if let Some(path) = &args.journal {
        let events = protocol.events_since(0);
        let written = journal::append_events(path, &events)?;
        tracing::info!(path = %path.display(), written, "Journal written");
    }

    println!("{}", serde_json::to_string_pretty(&protocol.health())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_and_flags() {
        let args = Args::try_parse_from(["field-simulate"]).unwrap();
        assert_eq!(args.nodes, 32);
        assert_eq!(args.seed, 7);
        assert!(args.journal.is_none());

        let args = Args::try_parse_from([
            "field-simulate",
            "--nodes",
            "8",
            "--seed",
            "42",
            "--journal",
            "events.jsonl",
        ])
        .unwrap();
        assert_eq!(args.nodes, 8);
        assert_eq!(args.seed, 42);
        assert_eq!(args.journal, Some(PathBuf::from("events.jsonl")));
    }

    #[test]
    fn test_rejects_unknown_flags_and_tiny_networks() {
        assert!(Args::try_parse_from(["field-simulate", "--jornal", "x"]).is_err());
        assert!(Args::try_parse_from(["field-simulate", "--nodes", "1"]).is_err());
        assert!(Args::try_parse_from(["field-simulate", "16"]).is_err());
    }
}
