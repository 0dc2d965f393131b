//! The linker itself: candidate search over the spatial index, the
//! link-edge factory, and the orchestration of destructive (graph build)
//! and non-destructive (single request) linking.
//!
//! Candidate ranking is deterministic by construction: distances are
//! memoized per edge id, candidates sort by `(distance, id)`, and the
//! epsilon cluster extends over every consecutive gap smaller than
//! [`DUPLICATE_WAY_EPSILON_METERS`], so paired one-way carriageways link
//! together no matter how the index happens to iterate.

use geo::Point;
use hashbrown::HashMap;
use itertools::Itertools;
use log::info;

use crate::geometry;
use crate::graph::{
    AnnotationSink, EdgeId, EdgeKind, GraphAnnotation, StreetGraph, VertexId, VertexKind,
};
use crate::index::{EdgeIndex, StopIndex};
use crate::request::{RoutingRequest, TraverseMode, TraverseModeSet};
use crate::splitter::{self, SplitPoint};
use crate::temporary::{RequestScratch, TempVertexId, TemporaryVertexKind, VertexRef};
use crate::{Error, DUPLICATE_WAY_EPSILON_METERS, MAX_SEARCH_RADIUS_METERS, WARNING_DISTANCE_METERS};

/// Street-network linker.
///
/// One instance drives one graph build (destructive linking) and can then
/// serve request-time origin/destination linking against the frozen index.
/// Concurrent linkers on the same graph are not supported.
pub struct StreetLinker {
    index: EdgeIndex,
    stop_index: Option<StopIndex>,
}

/// Result of a successful candidate search.
struct Candidates {
    /// The epsilon cluster, closest first.
    cluster: Vec<EdgeId>,
    /// Distance of the best candidate, in degrees of latitude.
    best: f64,
}

fn search_bounds(origin: Point<f64>, xscale: f64, radius_deg: f64) -> ([f64; 2], [f64; 2]) {
    (
        [origin.x() - radius_deg / xscale, origin.y() - radius_deg],
        [origin.x() + radius_deg / xscale, origin.y() + radius_deg],
    )
}

/// Project `point` onto `edge` in the edge's local frame (xscale from the
/// geometry's midpoint latitude) and apply endpoint snapping.
fn edge_split_point(graph: &StreetGraph, edge: EdgeId, point: Point<f64>) -> (SplitPoint, f64) {
    let data = graph
        .edge(edge)
        .street_data()
        .unwrap_or_else(|| panic!("cannot link to non-street edge {edge}"));
    let geometry = data.geometry();
    let first = geometry.0[0];
    let last = geometry.0[geometry.0.len() - 1];
    let xscale = geometry::lon_scale((first.y + last.y) / 2.0);
    let location = geometry::locate(point, geometry, xscale);
    (splitter::classify_split(location, geometry.0.len()), xscale)
}

/// The mode set a link search runs under: cyclists may walk their bike, so
/// bicycle search also accepts walk-only edges.
fn search_modes(mode: TraverseMode) -> TraverseModeSet {
    let mut modes = TraverseModeSet::of(mode);
    if mode == TraverseMode::Bicycle {
        modes.insert(TraverseMode::Walk);
    }
    modes
}

impl StreetLinker {
    /// Build a linker whose edge index covers every street edge of `graph`.
    #[must_use]
    pub fn for_graph(graph: &StreetGraph) -> Self {
        Self::with_index(EdgeIndex::build(graph))
    }

    /// Build a linker around a caller-supplied edge index. The index is
    /// handed back by [`StreetLinker::into_index`] when the linker is done.
    #[must_use]
    pub fn with_index(index: EdgeIndex) -> Self {
        Self {
            index,
            stop_index: None,
        }
    }

    /// Attach a transit-stop index, enabling the stop fallback for
    /// origin/destination linking.
    #[must_use]
    pub fn with_stop_index(mut self, stops: StopIndex) -> Self {
        self.stop_index = Some(stops);
        self
    }

    #[must_use]
    pub fn index(&self) -> &EdgeIndex {
        &self.index
    }

    /// Hand the edge index back to the caller.
    #[must_use]
    pub fn into_index(self) -> EdgeIndex {
        self.index
    }

    /// Link every transit stop, bike-rental station, and bike park of
    /// `graph` to its closest walkable street. Entities that cannot be
    /// linked are reported to `sink` and skipped; one miss never stops the
    /// pass.
    pub fn link_all(&self, graph: &mut StreetGraph, sink: &mut dyn AnnotationSink) {
        let ids: Vec<VertexId> = graph.vertex_ids().collect();
        let mut linked = 0usize;
        let mut missed = 0usize;
        for id in ids {
            let miss = match graph.vertex(id).kind() {
                VertexKind::TransitStop { .. } => GraphAnnotation::StopUnlinked(id),
                VertexKind::BikeRentalStation => GraphAnnotation::BikeRentalStationUnlinked(id),
                VertexKind::BikePark => GraphAnnotation::BikeParkUnlinked(id),
                VertexKind::Street | VertexKind::Splitter => continue,
            };
            if self.link_to_closest_walkable_edge(graph, id, sink) {
                linked += 1;
            } else {
                missed += 1;
                sink.report(miss);
            }
        }
        info!("linked {linked} entities to the street network, {missed} unlinked");
    }

    /// WALK-mode destructive linking, the form every graph build uses.
    pub fn link_to_closest_walkable_edge(
        &self,
        graph: &mut StreetGraph,
        vertex: VertexId,
        sink: &mut dyn AnnotationSink,
    ) -> bool {
        self.link_permanently(graph, vertex, TraverseMode::Walk, sink)
    }

    /// Permanently link `vertex` to every edge of the epsilon cluster
    /// reachable under `mode`. Returns whether a link was made; a miss
    /// leaves the graph untouched.
    pub fn link_permanently(
        &self,
        graph: &mut StreetGraph,
        vertex: VertexId,
        mode: TraverseMode,
        sink: &mut dyn AnnotationSink,
    ) -> bool {
        let origin = *graph.vertex(vertex).geometry();
        let Some(candidates) = self.candidate_edges(graph, origin, search_modes(mode)) else {
            return false;
        };

        if matches!(graph.vertex(vertex).kind(), VertexKind::TransitStop { .. }) {
            let meters = geometry::degrees_to_meters(candidates.best);
            if meters > WARNING_DISTANCE_METERS {
                sink.report(GraphAnnotation::StopLinkedTooFar {
                    stop: vertex,
                    distance_meters: meters,
                });
            }
        }

        for edge in candidates.cluster {
            self.link_vertex_to_edge(graph, vertex, edge);
        }
        true
    }

    /// Non-destructively link the temporary location `location` under
    /// `mode`. All created entities land in `scratch`. When no street edge
    /// is in range and a stop index was attached, falls back to direct
    /// free edges toward the epsilon cluster of nearby transit stops.
    ///
    /// # Errors
    /// Propagates the trivial-path signal raised by
    /// [`RoutingRequest::can_split_edge`]; the linker does not catch it.
    pub fn link_temporarily(
        &self,
        graph: &StreetGraph,
        scratch: &mut RequestScratch,
        location: TempVertexId,
        mode: TraverseMode,
        options: Option<&RoutingRequest>,
    ) -> Result<bool, Error> {
        let origin = *scratch.vertex(location).geometry();
        if let Some(candidates) = self.candidate_edges(graph, origin, search_modes(mode)) {
            for edge in candidates.cluster {
                self.link_location_to_edge(graph, scratch, location, edge, options)?;
            }
            return Ok(true);
        }

        let Some(stops) = &self.stop_index else {
            return Ok(false);
        };
        let cluster = candidate_stops(stops, origin);
        if cluster.is_empty() {
            return Ok(false);
        }
        for stop in cluster {
            Self::make_temporary_link_edge(scratch, location, VertexRef::Graph(stop));
        }
        Ok(true)
    }

    /// Epsilon cluster of traversable, live edges around `origin`, or
    /// `None` when nothing is within the search radius.
    fn candidate_edges(
        &self,
        graph: &StreetGraph,
        origin: Point<f64>,
        modes: TraverseModeSet,
    ) -> Option<Candidates> {
        let xscale = geometry::lon_scale(origin.y());
        let radius_deg = geometry::meters_to_degrees(MAX_SEARCH_RADIUS_METERS);
        let epsilon_deg = geometry::meters_to_degrees(DUPLICATE_WAY_EPSILON_METERS);

        let (lower, upper) = search_bounds(origin, xscale, radius_deg);
        let mut distances: HashMap<EdgeId, f64> = HashMap::new();
        let mut candidates: Vec<EdgeId> = Vec::new();
        for edge in self.index.query(lower, upper) {
            let Some(data) = graph.edge(edge).street_data() else {
                continue;
            };
            if !data.can_traverse(modes) || !graph.is_in_graph(edge) {
                continue;
            }
            distances.insert(
                edge,
                geometry::linestring_distance(origin, data.geometry(), xscale),
            );
            candidates.push(edge);
        }

        candidates.sort_unstable_by(|a, b| distances[a].total_cmp(&distances[b]).then(a.cmp(b)));
        let &best_edge = candidates.first()?;
        let best = distances[&best_edge];
        if best > radius_deg {
            return None;
        }

        // the longest prefix whose consecutive distance gaps stay under
        // epsilon
        let cluster_len = 1 + candidates
            .iter()
            .tuple_windows()
            .take_while(|&(a, b)| distances[b] - distances[a] < epsilon_deg)
            .count();
        candidates.truncate(cluster_len);
        Some(Candidates {
            cluster: candidates,
            best,
        })
    }

    fn link_vertex_to_edge(&self, graph: &mut StreetGraph, vertex: VertexId, edge: EdgeId) {
        let origin = *graph.vertex(vertex).geometry();
        let (split, xscale) = edge_split_point(graph, edge, origin);
        match split {
            SplitPoint::AtStart => {
                let target = graph.edge(edge).from_vertex();
                Self::make_permanent_link_edges(graph, vertex, target);
            }
            SplitPoint::AtEnd => {
                let target = graph.edge(edge).to_vertex();
                Self::make_permanent_link_edges(graph, vertex, target);
            }
            SplitPoint::Interior(location) => {
                let target = splitter::split_destructive(graph, &self.index, edge, location, xscale);
                Self::make_permanent_link_edges(graph, vertex, target);
            }
        }
    }

    fn link_location_to_edge(
        &self,
        graph: &StreetGraph,
        scratch: &mut RequestScratch,
        location: TempVertexId,
        edge: EdgeId,
        options: Option<&RoutingRequest>,
    ) -> Result<(), Error> {
        let origin = *scratch.vertex(location).geometry();
        let (split, _) = edge_split_point(graph, edge, origin);
        match split {
            SplitPoint::AtStart => {
                let target = graph.edge(edge).from_vertex();
                Self::make_temporary_link_edge(scratch, location, VertexRef::Graph(target));
            }
            SplitPoint::AtEnd => {
                let target = graph.edge(edge).to_vertex();
                Self::make_temporary_link_edge(scratch, location, VertexRef::Graph(target));
            }
            SplitPoint::Interior(split_location) => {
                if let Some(options) = options {
                    if !options.can_split_edge(edge)? {
                        return Ok(());
                    }
                }
                let end_vertex = scratch.vertex(location).is_end_vertex();
                let target = splitter::split_temporary(graph, scratch, edge, split_location, end_vertex);
                Self::make_temporary_link_edge(scratch, location, VertexRef::Temporary(target));
            }
        }
        Ok(())
    }

    /// Create the permanent bidirectional link pair between `entity` and a
    /// street-network vertex. An identical pair that already exists is left
    /// alone, so repeated linking is a no-op.
    ///
    /// # Panics
    /// Panics if `entity` has no permanent link form; street and splitter
    /// vertices are link targets, never link sources.
    fn make_permanent_link_edges(graph: &mut StreetGraph, entity: VertexId, target: VertexId) {
        let kind = match graph.vertex(entity).kind() {
            VertexKind::TransitStop {
                wheelchair_accessible,
            } => EdgeKind::StreetTransitLink {
                wheelchair_accessible: *wheelchair_accessible,
            },
            VertexKind::BikeRentalStation => EdgeKind::StreetBikeRentalLink,
            VertexKind::BikePark => EdgeKind::StreetBikeParkLink,
            VertexKind::Street | VertexKind::Splitter => {
                panic!("vertex {entity} has no permanent link form")
            }
        };
        let exists = graph.outgoing(entity).iter().any(|&id| {
            let edge = graph.edge(id);
            edge.to_vertex() == target && *edge.kind() == kind
        });
        if exists {
            return;
        }
        graph.add_edge(entity, target, kind.clone());
        graph.add_edge(target, entity, kind);
    }

    /// Create the request-scoped free edge between a temporary location
    /// and its link target, oriented by the location's end-vertex flag. A
    /// wheelchair-accessible temporary splitter target makes the location
    /// accessible too.
    ///
    /// # Panics
    /// Panics if `location` is not a temporary street location.
    fn make_temporary_link_edge(
        scratch: &mut RequestScratch,
        location: TempVertexId,
        target: VertexRef,
    ) {
        if let VertexRef::Temporary(id) = target {
            if let TemporaryVertexKind::Splitter {
                wheelchair_accessible: true,
                ..
            } = scratch.vertex(id).kind()
            {
                scratch.set_wheelchair_accessible(location, true);
            }
        }
        let end_vertex = match scratch.vertex(location).kind() {
            TemporaryVertexKind::StreetLocation { end_vertex, .. } => *end_vertex,
            TemporaryVertexKind::Splitter { .. } => {
                panic!("only temporary street locations originate free edges")
            }
        };
        if end_vertex {
            scratch.add_free_edge(target, VertexRef::Temporary(location));
        } else {
            scratch.add_free_edge(VertexRef::Temporary(location), target);
        }
    }
}

/// Epsilon cluster of transit stops around `origin`, or empty when nothing
/// is within the search radius. Same envelope, ordering, and epsilon policy
/// as the edge search, with point-to-point distances.
fn candidate_stops(stops: &StopIndex, origin: Point<f64>) -> Vec<VertexId> {
    let xscale = geometry::lon_scale(origin.y());
    let radius_deg = geometry::meters_to_degrees(MAX_SEARCH_RADIUS_METERS);
    let epsilon_deg = geometry::meters_to_degrees(DUPLICATE_WAY_EPSILON_METERS);

    let (lower, upper) = search_bounds(origin, xscale, radius_deg);
    let mut distances: HashMap<VertexId, f64> = HashMap::new();
    let mut candidates: Vec<VertexId> = Vec::new();
    for (stop, geometry) in stops.query(lower, upper) {
        distances.insert(stop, geometry::point_distance(origin, geometry, xscale));
        candidates.push(stop);
    }

    candidates.sort_unstable_by(|a, b| distances[a].total_cmp(&distances[b]).then(a.cmp(b)));
    let Some(&best_stop) = candidates.first() else {
        return Vec::new();
    };
    if distances[&best_stop] > radius_deg {
        return Vec::new();
    }

    let cluster_len = 1 + candidates
        .iter()
        .tuple_windows()
        .take_while(|&(a, b)| distances[b] - distances[a] < epsilon_deg)
        .count();
    candidates.truncate(cluster_len);
    candidates
}
