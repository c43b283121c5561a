//! Ledger audit binary
//!
//! Replays a JSON-lines journal, re-checks the conservation law at every
//! commit boundary and prints the resulting totals and Merkle root.
//!
//! ```text
//! ledger-audit <journal.jsonl>
//! ```

use anyhow::{bail, Context};
use ledger_core::{crypto, journal, Ledger};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: ledger-audit <journal.jsonl>");
    };

    tracing::info!(%path, "Auditing journal");

    let events = journal::read_events(&path).with_context(|| format!("reading {}", path))?;
    let hashes = events
        .iter()
        .map(crypto::hash_event)
        .collect::<ledger_core::Result<Vec<_>>>()?;
    let ledger = Ledger::replay(events).context("replay failed")?;

    let totals = ledger.totals();
    let gross = ledger.gross_totals();

    println!("events        {}", ledger.event_count());
    println!("inflow        {}", totals.inflow);
    println!("routed        {}", totals.routed);
    println!("stored        {}", totals.stored);
    println!("pooled        {}", totals.pooled);
    println!("burned        {}", totals.burned);
    println!("redeemed      {}", gross.redeemed);
    println!("returned      {}", gross.returned);
    for (pool, balance) in ledger.pool_balances() {
        println!("{:<24}{}", pool.to_string(), balance);
    }
    println!("merkle root   {}", crypto::to_hex(&crypto::merkle_root(&hashes)));

    if !totals.is_balanced() {
        bail!("conservation law broken: discrepancy {}", totals.discrepancy());
    }

    tracing::info!(events = ledger.event_count(), "Journal consistent");
    Ok(())
}
