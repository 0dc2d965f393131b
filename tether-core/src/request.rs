//! Traversal modes and the per-request carrier the linker consults while
//! linking origin and destination points.

use std::cell::RefCell;

use hashbrown::HashSet;

use crate::graph::EdgeId;
use crate::Error;

/// A single traversal mode.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TraverseMode {
    Walk,
    Bicycle,
    Car,
    Transit,
}

/// Set of traversal modes, used both as edge permissions and as the mode
/// selection of a request.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct TraverseModeSet {
    pub walk: bool,
    pub bicycle: bool,
    pub car: bool,
    pub transit: bool,
}

impl TraverseModeSet {
    /// The set holding exactly `mode`.
    #[must_use]
    pub fn of(mode: TraverseMode) -> Self {
        let mut set = Self::default();
        set.insert(mode);
        set
    }

    /// Builder-style insertion.
    #[must_use]
    pub fn with(mut self, mode: TraverseMode) -> Self {
        self.insert(mode);
        self
    }

    pub fn insert(&mut self, mode: TraverseMode) {
        match mode {
            TraverseMode::Walk => self.walk = true,
            TraverseMode::Bicycle => self.bicycle = true,
            TraverseMode::Car => self.car = true,
            TraverseMode::Transit => self.transit = true,
        }
    }

    #[must_use]
    pub const fn contains(self, mode: TraverseMode) -> bool {
        match mode {
            TraverseMode::Walk => self.walk,
            TraverseMode::Bicycle => self.bicycle,
            TraverseMode::Car => self.car,
            TraverseMode::Transit => self.transit,
        }
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.walk && other.walk)
            || (self.bicycle && other.bicycle)
            || (self.car && other.car)
            || (self.transit && other.transit)
    }
}

/// Options of one routing request, as far as the linker cares: the mode
/// selection, the car hand-over flags, and the record of edges already
/// split on the request's behalf.
#[derive(Debug, Default)]
pub struct RoutingRequest {
    pub modes: TraverseModeSet,
    pub park_and_ride: bool,
    pub kiss_and_ride: bool,
    split_edges: RefCell<HashSet<EdgeId>>,
}

impl RoutingRequest {
    #[must_use]
    pub fn new(modes: TraverseModeSet) -> Self {
        Self {
            modes,
            ..Self::default()
        }
    }

    /// Whether `edge` may be split for this request. Approvals are
    /// recorded: a second approval request for the same edge means origin
    /// and destination project onto one edge, so the path is trivial and
    /// the street network is never entered.
    ///
    /// Transit-capable requests always permit splits; transfers make the
    /// shared edge reachable anyway.
    ///
    /// # Errors
    /// Returns [`Error::TrivialPath`] on the second approval for one edge.
    pub fn can_split_edge(&self, edge: EdgeId) -> Result<bool, Error> {
        if self.modes.contains(TraverseMode::Transit) {
            return Ok(true);
        }
        if self.split_edges.borrow_mut().insert(edge) {
            Ok(true)
        } else {
            Err(Error::TrivialPath)
        }
    }
}
