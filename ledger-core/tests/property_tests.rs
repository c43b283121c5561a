//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify:
//! - Conservation: every accepted commit leaves the totals balanced
//! - Fail closed: an unbalanced batch changes nothing
//! - Deterministic replay: same events → same state
//! - Anchoring: sealed blocks verify against the history they cover

use chrono::{Duration, Utc};
use ledger_core::{
    InstrumentId, Ledger, NodeId, PendingEvent, PoolKind, RedemptionChannel, Reference,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Strategy for generating amounts with 8 fractional digits
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000_000i64).prop_map(|units| Decimal::new(units, 8))
}

fn pool_strategy() -> impl Strategy<Value = PoolKind> {
    prop_oneof![
        Just(PoolKind::Liquidity),
        Just(PoolKind::TreasurySurplus),
        Just(PoolKind::Infrastructure),
        Just(PoolKind::Buffer),
        Just(PoolKind::Stability),
        Just(PoolKind::LiquidityDepth),
        Just(PoolKind::Intelligence),
        Just(PoolKind::Compliance),
    ]
}

/// One balanced injection: inflow split between a node and a pool
fn injection_strategy() -> impl Strategy<Value = Vec<PendingEvent>> {
    (amount_strategy(), 0u32..=100, "[a-e]", pool_strategy()).prop_map(
        |(amount, percent, node, pool)| {
            let r = Reference::Injection(Uuid::now_v7());
            let routed = (amount * Decimal::new(percent as i64, 2)).round_dp(8);
            vec![
                PendingEvent::inflow(NodeId::new("origin"), amount, r.clone()),
                PendingEvent::route(NodeId::new(node), routed, 1, r.clone()),
                PendingEvent::pool(pool, amount - routed, r),
            ]
        },
    )
}

fn build(batches: &[Vec<PendingEvent>]) -> Ledger {
    let mut ledger = Ledger::new();
    let start = Utc::now();
    for (i, batch) in batches.iter().enumerate() {
        ledger
            .append_batch(batch.clone(), start + Duration::seconds(i as i64))
            .unwrap();
    }
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: balanced batches are always accepted and keep the law
    #[test]
    fn prop_balanced_batches_conserve(batches in prop::collection::vec(injection_strategy(), 1..20)) {
        let ledger = build(&batches);
        let totals = ledger.totals();

        prop_assert!(totals.is_balanced());
        prop_assert_eq!(totals.discrepancy(), Decimal::ZERO);
        prop_assert_eq!(ledger.event_count(), batches.len() * 3);
        prop_assert!(!ledger.is_halted());
    }

    /// Property: an unbalanced batch is refused without side effects
    #[test]
    fn prop_unbalanced_batch_changes_nothing(
        batches in prop::collection::vec(injection_strategy(), 1..10),
        leak in amount_strategy(),
    ) {
        let mut ledger = build(&batches);
        let before = ledger.totals();
        let count = ledger.event_count();

        let r = Reference::Injection(Uuid::now_v7());
        let result = ledger.append_batch(
            vec![
                PendingEvent::inflow(NodeId::new("origin"), leak, r.clone()),
                PendingEvent::pool(PoolKind::Buffer, leak - Decimal::new(1, 8), r),
            ],
            Utc::now() + Duration::days(1),
        );

        prop_assert!(result.is_err());
        prop_assert_eq!(ledger.totals(), before);
        prop_assert_eq!(ledger.event_count(), count);
    }

    /// Property: replay reproduces totals, balances and pools
    #[test]
    fn prop_deterministic_replay(batches in prop::collection::vec(injection_strategy(), 1..20)) {
        let ledger = build(&batches);
        let replayed = Ledger::replay(ledger.events().to_vec()).unwrap();

        prop_assert_eq!(replayed.totals(), ledger.totals());
        prop_assert_eq!(replayed.gross_totals(), ledger.gross_totals());
        prop_assert_eq!(replayed.pool_balances(), ledger.pool_balances());
        for node in ["a", "b", "c", "d", "e"] {
            let id = NodeId::new(node);
            prop_assert_eq!(replayed.balance_of(&id), ledger.balance_of(&id));
        }
    }

    /// Property: each sealed block verifies and chains to its predecessor
    #[test]
    fn prop_blocks_chain_and_verify(batches in prop::collection::vec(injection_strategy(), 2..12)) {
        let mut ledger = Ledger::new();
        let start = Utc::now();
        for (i, batch) in batches.iter().enumerate() {
            let at = start + Duration::seconds(i as i64);
            ledger.append_batch(batch.clone(), at).unwrap();
            if i % 2 == 1 {
                ledger.seal_block(at, None).unwrap();
            }
        }

        let blocks = ledger.blocks();
        prop_assert_eq!(blocks.len(), batches.len() / 2);
        for pair in blocks.windows(2) {
            prop_assert_eq!(pair[1].previous_hash, pair[0].block_hash);
            prop_assert_eq!(pair[1].first_sequence, pair[0].last_sequence + 1);
        }
        for block in blocks {
            prop_assert!(ledger.verify_block(block).unwrap());
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_full_instrument_lifecycle() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let holder = NodeId::new("holder");
        let r = Reference::Injection(Uuid::now_v7());

        // 1. Value settles to the holder
        ledger
            .append_batch(
                vec![
                    PendingEvent::inflow(NodeId::new("origin"), Decimal::from(200), r.clone()),
                    PendingEvent::route(holder.clone(), Decimal::from(200), 1, r),
                ],
                now,
            )
            .unwrap();

        // 2. Two instruments lock 100 each
        let gold = Reference::Instrument(InstrumentId::new("HC-GOLD"));
        let cancelled = Reference::Instrument(InstrumentId::new("HC-CANCEL"));
        ledger
            .append(PendingEvent::store(holder.clone(), Decimal::from(100), gold.clone()), now)
            .unwrap();
        ledger
            .append(PendingEvent::store(holder.clone(), Decimal::from(100), cancelled.clone()), now)
            .unwrap();
        assert_eq!(ledger.balance_of(&holder), Decimal::ZERO);

        // 3. One is redeemed for gold
        ledger
            .append(
                PendingEvent::redeem(holder.clone(), Decimal::from(100), RedemptionChannel::Gold, gold),
                now,
            )
            .unwrap();

        // 4. The other is cancelled with 2% friction
        ledger
            .append_batch(
                vec![
                    PendingEvent::burn(Some(holder.clone()), Decimal::from(2), cancelled.clone()),
                    PendingEvent::cancel_return(holder.clone(), Decimal::from(98), cancelled),
                ],
                now,
            )
            .unwrap();

        let totals = ledger.totals();
        assert_eq!(totals.stored, Decimal::ZERO);
        assert_eq!(totals.burned, Decimal::from(2));
        assert_eq!(totals.routed, Decimal::from(198));
        assert!(totals.is_balanced());
        assert_eq!(ledger.balance_of(&holder), Decimal::from(98));

        let gross = ledger.gross_totals();
        assert_eq!(gross.redeemed, Decimal::from(100));
        assert_eq!(gross.returned, Decimal::from(98));
    }
}
