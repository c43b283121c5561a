//! Property-based tests for graph invariants
//!
//! - Degree bound: active-bond count stays within [0, max_bonds]
//! - Bond symmetry: one record per unordered pair
//! - Traversal: each node once, at its shortest distance

use chrono::{Duration, Utc};
use field_graph::{BondKey, Error, RelationshipGraph};
use ledger_core::{NodeId, ProtocolConfig};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const NODES: usize = 8;

fn id(i: usize) -> NodeId {
    NodeId::new(format!("n{}", i))
}

#[derive(Debug, Clone)]
enum Op {
    Form(usize, usize),
    Dissolve(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..NODES, 0..NODES).prop_map(|(a, b)| Op::Form(a, b)),
        1 => (0..NODES, 0..NODES).prop_map(|(a, b)| Op::Dissolve(a, b)),
    ]
}

/// Apply ops one day apart so cooldown never interferes
fn run(ops: &[Op]) -> RelationshipGraph {
    let t0 = Utc::now();
    let mut graph = RelationshipGraph::new(Arc::new(ProtocolConfig::default()));
    for i in 0..NODES {
        graph.add_node(id(i), t0);
    }

    for (step, op) in ops.iter().enumerate() {
        let at = t0 + Duration::hours(25 * (step as i64 + 1));
        match op {
            Op::Form(a, b) => {
                let _ = graph.form_bond(&id(*a), &id(*b), at);
            }
            Op::Dissolve(a, b) => {
                let _ = graph.dissolve_bond(&id(*a), &id(*b), at);
            }
        }
    }
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: degree never exceeds the configured bound and matches adjacency
    #[test]
    fn prop_degree_bound(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let graph = run(&ops);
        let max = ProtocolConfig::default().field.max_bonds;

        for node in graph.nodes() {
            prop_assert!(node.active_bonds <= max);
            prop_assert_eq!(node.active_bonds as usize, graph.bonds_of(&node.id).len());
            prop_assert_eq!(node.active_bonds as usize, graph.neighbors(&node.id).count());
        }
    }

    /// Property: both orders of a pair address the same record
    #[test]
    fn prop_bond_symmetry(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let graph = run(&ops);

        let mut seen: HashMap<BondKey, usize> = HashMap::new();
        for a in 0..NODES {
            for b in 0..NODES {
                let forward = graph.bond_between(&id(a), &id(b)).map(|bond| bond.id);
                let backward = graph.bond_between(&id(b), &id(a)).map(|bond| bond.id);
                prop_assert_eq!(forward, backward);

                if let Some(bond) = graph.bond_between(&id(a), &id(b)) {
                    prop_assert!(a != b);
                    *seen.entry(bond.key.clone()).or_default() += 1;
                }
            }
        }
        // each unordered pair was visited twice, once per order
        prop_assert!(seen.values().all(|count| *count == 2));
    }

    /// Property: traversal visits each node once, at its shortest distance
    #[test]
    fn prop_traversal_shortest_hops(
        ops in prop::collection::vec(op_strategy(), 0..80),
        origin in 0..NODES,
        depth in 0u32..6,
    ) {
        let graph = run(&ops);
        let origin = id(origin);

        let walk: Vec<(NodeId, u32)> = graph
            .traverse(&origin, depth)
            .map(|(node, hop)| (node.clone(), hop))
            .collect();

        let unique: HashSet<&NodeId> = walk.iter().map(|(node, _)| node).collect();
        prop_assert_eq!(unique.len(), walk.len());
        prop_assert_eq!(walk.first().map(|(_, hop)| *hop), Some(0));

        for pair in walk.windows(2) {
            let (a, hop_a) = &pair[0];
            let (b, hop_b) = &pair[1];
            prop_assert!(hop_a < hop_b || (hop_a == hop_b && a < b));
        }

        for (node, hop) in &walk {
            prop_assert!(*hop <= depth);
            let path = graph.shortest_path(&origin, node).unwrap().unwrap();
            prop_assert_eq!(path.len() as u32 - 1, *hop);
        }
    }
}

#[test]
fn test_sixth_bond_is_saturated() {
    let t0 = Utc::now();
    let mut graph = RelationshipGraph::new(Arc::new(ProtocolConfig::default()));
    for i in 0..7 {
        graph.add_node(id(i), t0);
    }

    for i in 1..=5 {
        let at = t0 + Duration::hours(25 * i as i64);
        graph.form_bond(&id(0), &id(i), at).unwrap();
    }

    let err = graph
        .form_bond(&id(0), &id(6), t0 + Duration::days(30))
        .unwrap_err();
    assert!(matches!(err, Error::Saturated { max: 5, .. }));
    assert_eq!(graph.node(&id(0)).unwrap().active_bonds, 5);
}
