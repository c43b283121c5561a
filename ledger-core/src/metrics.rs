//! Metrics collection for observability
//!
//! Prometheus counters for the ledger, registered on a private registry so
//! several ledgers can coexist in one process.
//!
//! # Metrics
//!
//! - `ledger_events_total` - Events appended
//! - `ledger_commits_total` - Atomic batches committed
//! - `ledger_commit_size` - Histogram of events per commit
//! - `ledger_rejected_commits_total` - Batches refused (invalid or unbalanced)
//! - `ledger_blocks_total` - Anchor blocks sealed

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Metrics collector
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Events appended
    pub events_total: IntCounter,

    /// Commits applied
    pub commits_total: IntCounter,

    /// Events per commit
    pub commit_size: Histogram,

    /// Commits refused
    pub rejected_commits_total: IntCounter,

    /// Anchor blocks sealed
    pub blocks_total: IntCounter,

    registry: Registry,
}

impl std::fmt::Debug for LedgerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerMetrics")
            .field("events_total", &self.events_total.get())
            .field("commits_total", &self.commits_total.get())
            .field("blocks_total", &self.blocks_total.get())
            .finish()
    }
}

impl LedgerMetrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let events_total = IntCounter::new("ledger_events_total", "Events appended")?;
        registry.register(Box::new(events_total.clone()))?;

        let commits_total = IntCounter::new("ledger_commits_total", "Atomic batches committed")?;
        registry.register(Box::new(commits_total.clone()))?;

        let commit_size = Histogram::with_opts(
            HistogramOpts::new("ledger_commit_size", "Histogram of events per commit")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(commit_size.clone()))?;

        let rejected_commits_total =
            IntCounter::new("ledger_rejected_commits_total", "Batches refused")?;
        registry.register(Box::new(rejected_commits_total.clone()))?;

        let blocks_total = IntCounter::new("ledger_blocks_total", "Anchor blocks sealed")?;
        registry.register(Box::new(blocks_total.clone()))?;

        Ok(Self {
            events_total,
            commits_total,
            commit_size,
            rejected_commits_total,
            blocks_total,
            registry,
        })
    }

    /// Record a committed batch
    pub fn record_commit(&self, event_count: usize) {
        self.commits_total.inc();
        self.events_total.inc_by(event_count as u64);
        self.commit_size.observe(event_count as f64);
    }

    /// Record a refused batch
    pub fn record_rejection(&self) {
        self.rejected_commits_total.inc();
    }

    /// Record a sealed block
    pub fn record_block_sealed(&self) {
        self.blocks_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render in the Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
