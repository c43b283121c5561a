//! Bounded-degree undirected relationship graph
//!
//! Bonds are a single symmetric relation keyed by [`BondKey`]; there are
//! no directional edges. Bond records are never removed, so the full
//! formation/dissolution history stays available for audit.
//!
//! Every mutating operation validates first and only then writes, so a
//! failed call leaves the graph exactly as it was.

use crate::{
    traverse::Traversal,
    types::{Bond, BondId, BondKey, BondState, Node, NodeState},
    Error, Result,
};
use chrono::{DateTime, Utc};
use ledger_core::{NodeId, ProtocolConfig};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Relationship graph
#[derive(Debug)]
pub struct RelationshipGraph {
    config: Arc<ProtocolConfig>,

    /// Registered nodes
    nodes: BTreeMap<NodeId, Node>,

    /// Every bond record ever created; `bonds[id.0]`
    bonds: Vec<Bond>,

    /// Canonical pair → record
    by_key: HashMap<BondKey, BondId>,

    /// Active neighbours, ascending
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl RelationshipGraph {
    /// Empty graph
    pub fn new(config: Arc<ProtocolConfig>) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
            bonds: Vec::new(),
            by_key: HashMap::new(),
            adjacency: BTreeMap::new(),
        }
    }

    /// Register a node; returns false if it was already known
    pub fn add_node(&mut self, id: NodeId, at: DateTime<Utc>) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        tracing::debug!(node = %id, "Node registered");
        self.nodes.insert(id.clone(), Node::new(id, at));
        true
    }

    /// Whether a node is registered
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Form (or reactivate) the bond between `a` and `b`
    ///
    /// Checks, in order: self bond, registration, already active,
    /// saturation, cooldown. An inactive record for the pair is
    /// reactivated instead of creating a new one.
    pub fn form_bond(&mut self, a: &NodeId, b: &NodeId, at: DateTime<Utc>) -> Result<BondId> {
        if a == b {
            return Err(Error::SelfBond(a.clone()));
        }
        let node_a = self.require(a)?;
        let node_b = self.require(b)?;

        let key = BondKey::new(a, b);
        let existing = self.by_key.get(&key).copied();
        if let Some(id) = existing {
            if self.bonds[id.0 as usize].is_active() {
                return Err(Error::AlreadyBonded(a.clone(), b.clone()));
            }
        }

        let max = self.config.field.max_bonds;
        for node in [node_a, node_b] {
            if node.active_bonds >= max {
                return Err(Error::Saturated {
                    node: node.id.clone(),
                    max,
                });
            }
        }

        let cooldown = self
            .config
            .bond_cooldown()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        for node in [node_a, node_b] {
            if let Some(last) = node.last_bond_at {
                let until = last.checked_add_signed(cooldown).ok_or_else(|| {
                    Error::Configuration(format!(
                        "cooldown of {} from {} overflows",
                        cooldown, last
                    ))
                })?;
                if at < until {
                    return Err(Error::Cooldown {
                        node: node.id.clone(),
                        until,
                    });
                }
            }
        }

        let id = match existing {
            Some(id) => {
                self.bonds[id.0 as usize].transition(BondState::Active, at)?;
                tracing::info!(bond = %id, pair = %key, "Bond reactivated");
                id
            }
            None => {
                let id = BondId(self.bonds.len() as u64);
                let mut bond = Bond::bound(id, key.clone(), at);
                bond.transition(BondState::Active, at)?;
                self.bonds.push(bond);
                self.by_key.insert(key.clone(), id);
                tracing::info!(bond = %id, pair = %key, "Bond formed");
                id
            }
        };

        for (node, other) in [(a, b), (b, a)] {
            if let Some(entry) = self.nodes.get_mut(node) {
                entry.active_bonds += 1;
                entry.last_bond_at = Some(at);
            }
            self.adjacency
                .entry(node.clone())
                .or_default()
                .insert(other.clone());
        }

        Ok(id)
    }

    /// Dissolve the active bond between `a` and `b`
    pub fn dissolve_bond(&mut self, a: &NodeId, b: &NodeId, at: DateTime<Utc>) -> Result<BondId> {
        let id = self
            .bond_between(a, b)
            .filter(|bond| bond.is_active())
            .map(|bond| bond.id)
            .ok_or_else(|| Error::NotFound(a.clone(), b.clone()))?;

        let bond = &mut self.bonds[id.0 as usize];
        bond.transition(BondState::Inactive, at)?;
        let key = bond.key.clone();
        let (low, high) = key.endpoints();

        for (node, other) in [(low, high), (high, low)] {
            if let Some(entry) = self.nodes.get_mut(node) {
                entry.active_bonds = entry.active_bonds.saturating_sub(1);
            }
            if let Some(neighbors) = self.adjacency.get_mut(node) {
                neighbors.remove(other);
            }
        }

        tracing::info!(bond = %id, "Bond dissolved");
        Ok(id)
    }

    /// Active bonds of a node (empty for unknown nodes)
    pub fn bonds_of(&self, node: &NodeId) -> BTreeSet<BondId> {
        self.neighbors(node)
            .filter_map(|other| self.by_key.get(&BondKey::new(node, other)).copied())
            .collect()
    }

    /// Active neighbours of a node, ascending
    pub fn neighbors<'a>(&'a self, node: &NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.adjacency.get(node).into_iter().flatten()
    }

    /// Lazy breadth-first walk from `origin` over active bonds
    ///
    /// Yields nothing for an unregistered origin.
    pub fn traverse<'g>(&'g self, origin: &NodeId, max_depth: u32) -> Traversal<'g> {
        match self.nodes.get_key_value(origin) {
            Some((origin, _)) => Traversal::new(self, origin, max_depth),
            None => Traversal::empty(self),
        }
    }

    /// Shortest path over active bonds, both endpoints included
    ///
    /// Among equally short paths the one through smaller ids wins.
    pub fn shortest_path(&self, from: &NodeId, to: &NodeId) -> Result<Option<Vec<NodeId>>> {
        self.require(from)?;
        self.require(to)?;
        if from == to {
            return Ok(Some(vec![from.clone()]));
        }

        let mut parent: HashMap<&NodeId, &NodeId> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current) {
                if next == from || parent.contains_key(next) {
                    continue;
                }
                parent.insert(next, current);

                if next == to {
                    let mut path = vec![to.clone()];
                    let mut cursor = to;
                    while let Some(&prev) = parent.get(cursor) {
                        path.push(prev.clone());
                        cursor = prev;
                    }
                    path.reverse();
                    return Ok(Some(path));
                }
                queue.push_back(next);
            }
        }

        Ok(None)
    }

    /// Node record
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All nodes, ascending by id
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Bond record by id
    pub fn bond(&self, id: BondId) -> Option<&Bond> {
        self.bonds.get(id.0 as usize)
    }

    /// Bond record for a pair, in any state
    pub fn bond_between(&self, a: &NodeId, b: &NodeId) -> Option<&Bond> {
        self.by_key
            .get(&BondKey::new(a, b))
            .and_then(|id| self.bond(*id))
    }

    /// Number of registered nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes with at least one active bond
    pub fn active_node_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_active()).count()
    }

    /// Connectivity state of a node
    pub fn node_state(&self, id: &NodeId, acknowledged: bool) -> Option<NodeState> {
        self.nodes.get(id).map(|n| n.state(acknowledged))
    }

    fn require(&self, id: &NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::UnknownNode(id.clone()))
    }
}
