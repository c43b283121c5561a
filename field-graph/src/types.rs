//! Graph types: nodes, bonds and their state machines

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use ledger_core::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bond record identifier (sequential, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BondId(pub u64);

impl fmt::Display for BondId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bond-{}", self.0)
    }
}

/// Order-independent pair of node ids
///
/// `BondKey::new(a, b) == BondKey::new(b, a)`, so both orders address the
/// same bond record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BondKey {
    low: NodeId,
    high: NodeId,
}

impl BondKey {
    /// Canonical pair for two endpoints
    pub fn new(a: &NodeId, b: &NodeId) -> Self {
        if a <= b {
            Self {
                low: a.clone(),
                high: b.clone(),
            }
        } else {
            Self {
                low: b.clone(),
                high: a.clone(),
            }
        }
    }

    /// Both endpoints, smaller id first
    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.low, &self.high)
    }
}

impl fmt::Display for BondKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.low, self.high)
    }
}

/// Bond lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondState {
    /// Endpoints have found each other
    Discover,
    /// Mutually accepted
    Bound,
    /// Counts toward degree and carries propagation
    Active,
    /// Dissolved; may only return to `Active`
    Inactive,
}

impl BondState {
    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(&self, next: BondState) -> bool {
        matches!(
            (self, next),
            (BondState::Discover, BondState::Bound)
                | (BondState::Bound, BondState::Active)
                | (BondState::Active, BondState::Inactive)
                | (BondState::Inactive, BondState::Active)
        )
    }
}

/// Undirected bond between two distinct nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    /// Record id
    pub id: BondId,
    /// Canonical endpoint pair
    pub key: BondKey,
    /// Current state
    pub state: BondState,
    /// Record creation
    pub created_at: DateTime<Utc>,
    /// First activation
    pub activated_at: Option<DateTime<Utc>>,
    /// Most recent reactivation
    pub last_reactivated_at: Option<DateTime<Utc>>,
    /// Most recent dissolution
    pub dissolved_at: Option<DateTime<Utc>>,
    /// Number of `Inactive -> Active` transitions
    pub reactivations: u32,
}

impl Bond {
    pub(crate) fn bound(id: BondId, key: BondKey, at: DateTime<Utc>) -> Self {
        Self {
            id,
            key,
            state: BondState::Bound,
            created_at: at,
            activated_at: None,
            last_reactivated_at: None,
            dissolved_at: None,
            reactivations: 0,
        }
    }

    /// Whether the bond counts toward degree
    pub fn is_active(&self) -> bool {
        self.state == BondState::Active
    }

    /// Apply a state transition, stamping the audit fields
    pub(crate) fn transition(&mut self, next: BondState, at: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        match (self.state, next) {
            (BondState::Inactive, BondState::Active) => {
                self.last_reactivated_at = Some(at);
                self.reactivations += 1;
            }
            (_, BondState::Active) => self.activated_at = Some(at),
            (_, BondState::Inactive) => self.dissolved_at = Some(at),
            _ => {}
        }

        self.state = next;
        Ok(())
    }
}

/// Connectivity state derived from active-bond count
///
/// The bands are absolute counts and do not scale with the configured
/// `max_bonds`: with a lower limit the upper states are unreachable, with a
/// higher one every degree from 5 up is `Stable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// No bonds, never settled
    Instantiated,
    /// No bonds, has received initial settlement
    Acknowledged,
    /// 1-2 active bonds
    Connected,
    /// 3-4 active bonds
    Propagating,
    /// 5 or more active bonds
    Stable,
}

impl NodeState {
    /// Pure function of the active-bond count
    ///
    /// `acknowledged` only matters at degree zero.
    pub fn from_degree(active_bonds: u8, acknowledged: bool) -> Self {
        match active_bonds {
            0 if acknowledged => NodeState::Acknowledged,
            0 => NodeState::Instantiated,
            1..=2 => NodeState::Connected,
            3..=4 => NodeState::Propagating,
            _ => NodeState::Stable,
        }
    }
}

/// Participant in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identity
    pub id: NodeId,
    /// Current active-bond count
    pub active_bonds: u8,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Last bond formation or reactivation
    pub last_bond_at: Option<DateTime<Utc>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            active_bonds: 0,
            created_at: at,
            last_bond_at: None,
        }
    }

    /// Whether the node can receive propagation settlement
    pub fn is_active(&self) -> bool {
        self.active_bonds > 0
    }

    /// Connectivity state
    pub fn state(&self, acknowledged: bool) -> NodeState {
        NodeState::from_degree(self.active_bonds, acknowledged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bond_key_is_order_independent() {
        let (a, b) = (NodeId::new("alice"), NodeId::new("bob"));
        let ab = BondKey::new(&a, &b);
        let ba = BondKey::new(&b, &a);

        assert_eq!(ab, ba);
        assert_eq!(ab.endpoints(), (&a, &b));
        assert_eq!(ba.endpoints(), (&a, &b));
    }

    #[test]
    fn test_bond_state_machine() {
        use BondState::*;

        assert!(Discover.can_transition_to(Bound));
        assert!(Bound.can_transition_to(Active));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));

        assert!(!Inactive.can_transition_to(Bound));
        assert!(!Inactive.can_transition_to(Discover));
        assert!(!Active.can_transition_to(Bound));
        assert!(!Bound.can_transition_to(Inactive));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_reactivation_stamps_audit_fields() {
        let t0 = Utc::now();
        let key = BondKey::new(&NodeId::new("a"), &NodeId::new("b"));
        let mut bond = Bond::bound(BondId(0), key, t0);

        bond.transition(BondState::Active, t0).unwrap();
        bond.transition(BondState::Inactive, t0).unwrap();
        bond.transition(BondState::Active, t0).unwrap();

        assert_eq!(bond.activated_at, Some(t0));
        assert_eq!(bond.dissolved_at, Some(t0));
        assert_eq!(bond.last_reactivated_at, Some(t0));
        assert_eq!(bond.reactivations, 1);

        let err = bond.transition(BondState::Bound, t0).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_node_state_from_degree() {
        assert_eq!(NodeState::from_degree(0, false), NodeState::Instantiated);
        assert_eq!(NodeState::from_degree(0, true), NodeState::Acknowledged);
        assert_eq!(NodeState::from_degree(2, false), NodeState::Connected);
        assert_eq!(NodeState::from_degree(3, true), NodeState::Propagating);
        assert_eq!(NodeState::from_degree(5, false), NodeState::Stable);
        // absolute bands, independent of a raised max_bonds
        assert_eq!(NodeState::from_degree(4, false), NodeState::Propagating);
        assert_eq!(NodeState::from_degree(8, false), NodeState::Stable);
    }
}
