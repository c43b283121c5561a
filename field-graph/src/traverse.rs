//! Lazy breadth-first traversal
//!
//! Levels are expanded one at a time. Within a level nodes are yielded in
//! ascending id order, so the walk is fully deterministic.

use crate::graph::RelationshipGraph;
use ledger_core::NodeId;
use std::collections::{BTreeSet, HashSet};

/// Iterator over `(node, hop)` pairs, origin first at hop 0
///
/// Each reachable node appears once, at its smallest hop distance over
/// active bonds. Nothing past `max_depth` is visited.
#[derive(Debug)]
pub struct Traversal<'g> {
    graph: &'g RelationshipGraph,
    visited: HashSet<&'g NodeId>,
    frontier: std::vec::IntoIter<&'g NodeId>,
    discovered: BTreeSet<&'g NodeId>,
    hop: u32,
    max_depth: u32,
}

impl<'g> Traversal<'g> {
    pub(crate) fn new(graph: &'g RelationshipGraph, origin: &'g NodeId, max_depth: u32) -> Self {
        Self {
            graph,
            visited: HashSet::from([origin]),
            frontier: vec![origin].into_iter(),
            discovered: BTreeSet::new(),
            hop: 0,
            max_depth,
        }
    }

    /// An exhausted traversal, for origins the graph does not know
    pub(crate) fn empty(graph: &'g RelationshipGraph) -> Self {
        Self {
            graph,
            visited: HashSet::new(),
            frontier: Vec::new().into_iter(),
            discovered: BTreeSet::new(),
            hop: 0,
            max_depth: 0,
        }
    }
}

impl<'g> Iterator for Traversal<'g> {
    type Item = (&'g NodeId, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.frontier.next() {
                if self.hop < self.max_depth {
                    let visited = &self.visited;
                    self.discovered.extend(
                        self.graph
                            .neighbors(node)
                            .filter(|neighbor| !visited.contains(neighbor)),
                    );
                }
                return Some((node, self.hop));
            }

            if self.discovered.is_empty() {
                return None;
            }

            let level: Vec<&'g NodeId> = std::mem::take(&mut self.discovered)
                .into_iter()
                .filter(|node| self.visited.insert(*node))
                .collect();
            self.hop += 1;
            self.frontier = level.into_iter();
        }
    }
}
