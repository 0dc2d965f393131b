//! Spatial indexes over the street network: the edge index the linker keeps
//! current while it splits edges, and a read-only transit-stop index used
//! as a linking fallback.

use std::sync::{RwLock, RwLockWriteGuard};

use geo::{BoundingRect, LineString, Point};
use rstar::primitives::GeomWithData;
use rstar::{RTree, RTreeObject, AABB};

use crate::graph::{EdgeId, StreetGraph, VertexId, VertexKind};

/// Entry of the edge index: an edge's bounding envelope plus its id.
///
/// Entries are never removed: a split edge keeps its entry and is filtered
/// out by the in-graph check at query time.
#[derive(Clone, Debug)]
pub struct IndexedEdge {
    envelope: AABB<[f64; 2]>,
    pub edge: EdgeId,
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn linestring_envelope(geometry: &LineString<f64>) -> AABB<[f64; 2]> {
    let rect = geometry
        .bounding_rect()
        .expect("street edge geometry holds at least two coordinates");
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Envelope-query-and-insert index over street-edge geometries.
///
/// Reads take a shared lock and may run concurrently; the only writer is a
/// destructive split, which holds the write guard just long enough to
/// register the two half-edges.
#[derive(Debug, Default)]
pub struct EdgeIndex {
    tree: RwLock<RTree<IndexedEdge>>,
}

impl EdgeIndex {
    /// Bulk-load an index over every street edge currently in `graph`.
    #[must_use]
    pub fn build(graph: &StreetGraph) -> Self {
        let entries: Vec<IndexedEdge> = graph
            .edges()
            .filter_map(|(id, edge)| {
                edge.street_data().map(|data| IndexedEdge {
                    envelope: linestring_envelope(data.geometry()),
                    edge: id,
                })
            })
            .collect();
        Self {
            tree: RwLock::new(RTree::bulk_load(entries)),
        }
    }

    /// Unordered ids of edges whose envelopes intersect the query box.
    /// Results may include edges already split out of the graph; callers
    /// filter through [`StreetGraph::is_in_graph`].
    #[must_use]
    pub fn query(&self, lower: [f64; 2], upper: [f64; 2]) -> Vec<EdgeId> {
        let envelope = AABB::from_corners(lower, upper);
        self.tree
            .read()
            .unwrap()
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.edge)
            .collect()
    }

    /// Register one edge geometry. Destructive splits insert their pair
    /// through a single shared write guard instead of calling this twice.
    pub fn insert(&self, geometry: &LineString<f64>, edge: EdgeId) {
        self.tree.write().unwrap().insert(IndexedEdge {
            envelope: linestring_envelope(geometry),
            edge,
        });
    }

    pub(crate) fn writer(&self) -> IndexWriter<'_> {
        IndexWriter {
            guard: self.tree.write().unwrap(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.read().unwrap().size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write guard over the edge index, scoped to one destructive split.
pub(crate) struct IndexWriter<'a> {
    guard: RwLockWriteGuard<'a, RTree<IndexedEdge>>,
}

impl IndexWriter<'_> {
    pub(crate) fn insert(&mut self, geometry: &LineString<f64>, edge: EdgeId) {
        self.guard.insert(IndexedEdge {
            envelope: linestring_envelope(geometry),
            edge,
        });
    }
}

/// Transit stop registered in the fallback index.
pub type IndexedStop = GeomWithData<Point<f64>, VertexId>;

/// Read-only index of transit stops, consulted when an origin or
/// destination has no street edge within range.
#[derive(Debug, Clone)]
pub struct StopIndex {
    tree: RTree<IndexedStop>,
}

impl StopIndex {
    /// Bulk-load every transit stop of `graph`.
    #[must_use]
    pub fn build(graph: &StreetGraph) -> Self {
        let stops: Vec<IndexedStop> = graph
            .vertices()
            .filter(|(_, vertex)| matches!(vertex.kind(), VertexKind::TransitStop { .. }))
            .map(|(id, vertex)| IndexedStop::new(*vertex.geometry(), id))
            .collect();
        Self {
            tree: RTree::bulk_load(stops),
        }
    }

    /// Unordered stops inside the query box.
    #[must_use]
    pub fn query(&self, lower: [f64; 2], upper: [f64; 2]) -> Vec<(VertexId, Point<f64>)> {
        let envelope = AABB::from_corners(Point::new(lower[0], lower[1]), Point::new(upper[0], upper[1]));
        self.tree
            .locate_in_envelope(&envelope)
            .map(|stop| (stop.data, *stop.geom()))
            .collect()
    }
}
