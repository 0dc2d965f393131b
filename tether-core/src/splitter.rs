//! Edge splitting.
//!
//! The linker snaps an entity to a point along a street edge and, unless
//! that point is close enough to one of the edge's endpoints, breaks the
//! edge in two at a splitter vertex. Destructive splits rewrite the
//! permanent graph; temporary splits shadow the edge with request-owned
//! twins and leave the graph alone.

use geo::Point;

use crate::geometry::{self, LinearLocation};
use crate::graph::{EdgeId, StreetGraph, VertexId, VertexKind};
use crate::index::EdgeIndex;
use crate::temporary::{RequestScratch, TempVertexId, VertexRef};
use crate::ENDPOINT_SNAP_EPSILON;

/// Where a linear location lands on an edge once endpoint snapping is
/// applied.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SplitPoint {
    /// Close enough to the start of the geometry: reuse the `from` vertex.
    AtStart,
    /// Close enough to the end: reuse the `to` vertex.
    AtEnd,
    /// Interior: a splitter vertex is required.
    Interior(LinearLocation),
}

/// Apply the endpoint-snapping rules to `location` on a polyline of
/// `num_points` coordinates.
#[must_use]
pub fn classify_split(location: LinearLocation, num_points: usize) -> SplitPoint {
    if location.segment == 0 && location.fraction < ENDPOINT_SNAP_EPSILON {
        return SplitPoint::AtStart;
    }
    if location.segment == num_points - 1
        || (location.segment == num_points - 2 && location.fraction > 1.0 - ENDPOINT_SNAP_EPSILON)
    {
        return SplitPoint::AtEnd;
    }
    SplitPoint::Interior(location)
}

/// Permanently split `edge` at `location`.
///
/// The new splitter vertex joins two fresh half-edges inheriting the
/// original edge's permissions, accessibility, and (interpolated)
/// elevation profile. Both halves are registered in `index` under a single
/// write guard, and the original edge is detached from its endpoints'
/// adjacency before the guard drops. The original's index entry stays
/// behind as a stale record; the in-graph filter hides it.
///
/// # Panics
/// Panics if `edge` is not a street edge.
pub fn split_destructive(
    graph: &mut StreetGraph,
    index: &EdgeIndex,
    edge: EdgeId,
    location: LinearLocation,
    xscale: f64,
) -> VertexId {
    let (from, to, data) = {
        let e = graph.edge(edge);
        let data = e
            .street_data()
            .unwrap_or_else(|| panic!("cannot split non-street edge {edge}"))
            .clone();
        (e.from_vertex(), e.to_vertex(), data)
    };

    let split_coord = geometry::point_at(data.geometry(), location);
    let splitter = graph.add_vertex(
        format!("split from {edge}"),
        Point::from(split_coord),
        VertexKind::Splitter,
    );

    let (first, second) = geometry::split_linestring(data.geometry(), location);
    let (first_elevation, second_elevation) = match data.elevation() {
        Some(profile) => {
            let fraction = geometry::length_fraction(data.geometry(), location, xscale);
            let (a, b) = geometry::split_elevation(profile, fraction);
            (Some(a), Some(b))
        }
        None => (None, None),
    };

    let first_half = graph.add_split_half(
        from,
        splitter,
        first.clone(),
        &data,
        first_elevation,
    );
    let second_half = graph.add_split_half(
        splitter,
        to,
        second.clone(),
        &data,
        second_elevation,
    );

    {
        let mut writer = index.writer();
        writer.insert(&first, first_half);
        writer.insert(&second, second_half);
        graph.detach_edge(edge);
    }

    splitter
}

/// Non-destructively split `edge` for one request: a temporary splitter
/// vertex plus two scratch-owned partial street edges mirroring the
/// halves. The permanent graph is not touched. The splitter copies the
/// edge's wheelchair flag and carries the request's `end_vertex` marker.
///
/// # Panics
/// Panics if `edge` is not a street edge.
pub fn split_temporary(
    graph: &StreetGraph,
    scratch: &mut RequestScratch,
    edge: EdgeId,
    location: LinearLocation,
    end_vertex: bool,
) -> TempVertexId {
    let e = graph.edge(edge);
    let data = e
        .street_data()
        .unwrap_or_else(|| panic!("cannot split non-street edge {edge}"));

    let split_coord = geometry::point_at(data.geometry(), location);
    let splitter = scratch.add_splitter(
        format!("split from {edge}"),
        Point::from(split_coord),
        end_vertex,
        data.wheelchair_accessible(),
    );

    let (first, second) = geometry::split_linestring(data.geometry(), location);
    scratch.add_partial_street(
        VertexRef::Graph(e.from_vertex()),
        VertexRef::Temporary(splitter),
        first,
        data.permissions(),
        data.wheelchair_accessible(),
    );
    scratch.add_partial_street(
        VertexRef::Temporary(splitter),
        VertexRef::Graph(e.to_vertex()),
        second,
        data.permissions(),
        data.wheelchair_accessible(),
    );

    splitter
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use geo::{line_string, point};

    use super::*;
    use crate::request::{TraverseMode, TraverseModeSet};
    use crate::temporary::TemporaryVertexKind;

    fn graph_with_edge() -> (StreetGraph, VertexId, VertexId, EdgeId) {
        let mut graph = StreetGraph::new();
        let a = graph.add_street_vertex("a", point!(x: 0.0, y: 0.0));
        let b = graph.add_street_vertex("b", point!(x: 0.001, y: 0.0));
        let edge = graph
            .add_street_edge(
                a,
                b,
                line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)],
                TraverseModeSet::of(TraverseMode::Walk),
                true,
            )
            .unwrap();
        (graph, a, b, edge)
    }

    #[test]
    fn test_classify_snaps_to_endpoints() {
        let at_start = LinearLocation {
            segment: 0,
            fraction: 1e-9,
        };
        assert_eq!(classify_split(at_start, 2), SplitPoint::AtStart);

        let at_end = LinearLocation {
            segment: 0,
            fraction: 1.0 - 1e-9,
        };
        assert_eq!(classify_split(at_end, 2), SplitPoint::AtEnd);

        let interior = LinearLocation {
            segment: 0,
            fraction: 0.5,
        };
        assert_eq!(classify_split(interior, 2), SplitPoint::Interior(interior));

        // interior segments never snap to the start rule
        let second_segment = LinearLocation {
            segment: 1,
            fraction: 1e-9,
        };
        assert_eq!(
            classify_split(second_segment, 3),
            SplitPoint::Interior(second_segment)
        );
    }

    #[test]
    fn test_destructive_split_rewrites_adjacency() {
        let (mut graph, a, b, edge) = graph_with_edge();
        let index = EdgeIndex::build(&graph);
        let location = LinearLocation {
            segment: 0,
            fraction: 0.5,
        };

        let splitter = split_destructive(&mut graph, &index, edge, location, 1.0);

        let vertex = graph.vertex(splitter);
        assert_eq!(vertex.kind(), &VertexKind::Splitter);
        assert_eq!(vertex.label(), "split from 0");
        assert_abs_diff_eq!(vertex.geometry().x(), 0.0005, epsilon = 1e-12);

        // the original is replaced by exactly two halves joining at the
        // splitter
        assert!(!graph.is_in_graph(edge));
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.outgoing(a).len(), 1);
        assert_eq!(graph.incoming(splitter).len(), 1);
        assert_eq!(graph.outgoing(splitter).len(), 1);
        assert_eq!(graph.incoming(b).len(), 1);
        // both halves are queryable; the stale original is too
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_destructive_split_partitions_elevation() {
        let mut graph = StreetGraph::new();
        let a = graph.add_street_vertex("a", point!(x: 0.0, y: 0.0));
        let b = graph.add_street_vertex("b", point!(x: 0.001, y: 0.0));
        let edge = graph
            .add_street_edge_with_elevation(
                a,
                b,
                line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)],
                TraverseModeSet::of(TraverseMode::Walk),
                false,
                vec![(0.0, 100.0), (1.0, 104.0)],
            )
            .unwrap();
        let index = EdgeIndex::build(&graph);

        let splitter = split_destructive(
            &mut graph,
            &index,
            edge,
            LinearLocation {
                segment: 0,
                fraction: 0.25,
            },
            1.0,
        );

        let first = graph.edge(graph.incoming(splitter)[0]);
        let second = graph.edge(graph.outgoing(splitter)[0]);
        assert_eq!(
            first.street_data().unwrap().elevation(),
            Some(&[(0.0, 100.0), (1.0, 101.0)][..])
        );
        assert_eq!(
            second.street_data().unwrap().elevation(),
            Some(&[(0.0, 101.0), (1.0, 104.0)][..])
        );
    }

    #[test]
    fn test_temporary_split_leaves_graph_alone() {
        let (graph, a, b, edge) = graph_with_edge();
        let before = graph.clone();
        let mut scratch = RequestScratch::new();
        let location = LinearLocation {
            segment: 0,
            fraction: 0.5,
        };

        let splitter = split_temporary(&graph, &mut scratch, edge, location, true);

        assert_eq!(graph, before);
        let vertex = scratch.vertex(splitter);
        assert!(matches!(
            vertex.kind(),
            TemporaryVertexKind::Splitter {
                end_vertex: true,
                wheelchair_accessible: true,
            }
        ));
        assert_eq!(scratch.edges().len(), 2);
        assert_eq!(
            scratch.edges()[0].from_vertex(),
            VertexRef::Graph(a)
        );
        assert_eq!(scratch.edges()[1].to_vertex(), VertexRef::Graph(b));
    }
}
