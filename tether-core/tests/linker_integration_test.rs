use approx::assert_abs_diff_eq;
use geo::{line_string, point};
use tether_core::prelude::*;

fn walk() -> TraverseModeSet {
    TraverseModeSet::of(TraverseMode::Walk)
}

/// Add a two-vertex street edge with a straight geometry.
fn street(
    graph: &mut StreetGraph,
    from_label: &str,
    to_label: &str,
    from: (f64, f64),
    to: (f64, f64),
) -> (VertexId, VertexId, EdgeId) {
    let a = graph.add_street_vertex(from_label, point!(x: from.0, y: from.1));
    let b = graph.add_street_vertex(to_label, point!(x: to.0, y: to.1));
    let edge = graph
        .add_street_edge(
            a,
            b,
            line_string![(x: from.0, y: from.1), (x: to.0, y: to.1)],
            walk(),
            true,
        )
        .expect("straight test geometry is valid");
    (a, b, edge)
}

fn splitter_vertices(graph: &StreetGraph) -> Vec<VertexId> {
    graph
        .vertices()
        .filter(|(_, v)| v.kind() == &VertexKind::Splitter)
        .map(|(id, _)| id)
        .collect()
}

fn transit_links(graph: &StreetGraph) -> Vec<(VertexId, VertexId)> {
    graph
        .edges()
        .filter(|(_, e)| matches!(e.kind(), EdgeKind::StreetTransitLink { .. }))
        .map(|(_, e)| (e.from_vertex(), e.to_vertex()))
        .collect()
}

fn live_street_edge_count(graph: &StreetGraph) -> usize {
    graph
        .edges()
        .filter(|(id, e)| e.street_data().is_some() && graph.is_in_graph(*id))
        .count()
}

fn kind_name(kind: &EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Street(_) => "street",
        EdgeKind::StreetTransitLink { .. } => "transit-link",
        EdgeKind::StreetBikeRentalLink => "bike-rental-link",
        EdgeKind::StreetBikeParkLink => "bike-park-link",
    }
}

/// Order-independent description of every live edge, by endpoint labels.
fn edge_signature(graph: &StreetGraph) -> Vec<(String, String, &'static str)> {
    let mut signature: Vec<(String, String, &'static str)> = graph
        .edges()
        .filter(|(id, _)| graph.is_in_graph(*id))
        .map(|(_, e)| {
            (
                graph.vertex(e.from_vertex()).label().to_string(),
                graph.vertex(e.to_vertex()).label().to_string(),
                kind_name(e.kind()),
            )
        })
        .collect();
    signature.sort();
    signature
}

#[test]
fn test_midpoint_link_splits_edge() {
    let mut graph = StreetGraph::new();
    let (_, _, edge) = street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), true);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));

    let splitters = splitter_vertices(&graph);
    assert_eq!(splitters.len(), 1);
    let splitter = splitters[0];
    assert_abs_diff_eq!(graph.vertex(splitter).geometry().x(), 0.0005, epsilon = 1e-12);
    assert_abs_diff_eq!(graph.vertex(splitter).geometry().y(), 0.0, epsilon = 1e-12);

    // the original edge is replaced by exactly two halves
    assert!(!graph.is_in_graph(edge));
    assert_eq!(live_street_edge_count(&graph), 2);

    let links = transit_links(&graph);
    assert_eq!(links.len(), 2);
    assert!(links.contains(&(stop, splitter)));
    assert!(links.contains(&(splitter, stop)));
    assert!(annotations.is_empty());
}

#[test]
fn test_endpoint_snap_reuses_intersection() {
    let mut graph = StreetGraph::new();
    let (a, _, edge) = street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));

    // no splitter vertex: the stop links straight to the from vertex
    assert!(splitter_vertices(&graph).is_empty());
    assert!(graph.is_in_graph(edge));
    let links = transit_links(&graph);
    assert_eq!(links.len(), 2);
    assert!(links.contains(&(stop, a)));
    assert!(links.contains(&(a, stop)));
}

#[test]
fn test_duplicate_ways_link_together() {
    let mut graph = StreetGraph::new();
    // paired one-way carriageways sharing one alignment
    let (_, _, first) = street(&mut graph, "a1", "b1", (0.0, 0.0), (0.001, 0.0));
    let (_, _, second) = street(&mut graph, "b2", "a2", (0.001, 0.0), (0.0, 0.0));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));

    // both ways split, four link edges
    assert_eq!(splitter_vertices(&graph).len(), 2);
    assert!(!graph.is_in_graph(first));
    assert!(!graph.is_in_graph(second));
    assert_eq!(transit_links(&graph).len(), 4);
}

#[test]
fn test_distinct_ways_link_nearest_only() {
    let mut graph = StreetGraph::new();
    let (_, _, far) = street(&mut graph, "a1", "b1", (0.0, 0.0), (0.001, 0.0));
    // a separate way about a meter closer to the stop
    let (_, _, near) = street(&mut graph, "a2", "b2", (0.0, 0.00001), (0.001, 0.00001));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));

    assert_eq!(splitter_vertices(&graph).len(), 1);
    assert!(graph.is_in_graph(far));
    assert!(!graph.is_in_graph(near));
    assert_eq!(transit_links(&graph).len(), 2);
}

#[test]
fn test_out_of_radius_reports_unlinked() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let stop = graph.add_transit_stop("stop", point!(x: 0.02, y: 0.02), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    linker.link_all(&mut graph, &mut annotations);

    assert_eq!(annotations, vec![GraphAnnotation::StopUnlinked(stop)]);
    assert!(transit_links(&graph).is_empty());
    assert_eq!(live_street_edge_count(&graph), 1);
}

#[test]
fn test_distance_filter_inside_envelope() {
    let mut graph = StreetGraph::new();
    // inside the square search envelope but beyond the radius along the
    // diagonal
    street(&mut graph, "a", "b", (0.0085, 0.0085), (0.0088, 0.0088));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0, y: 0.0), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(!linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));
    assert!(transit_links(&graph).is_empty());
}

#[test]
fn test_distant_stop_links_with_warning() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0005), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));

    assert_eq!(annotations.len(), 1);
    match &annotations[0] {
        GraphAnnotation::StopLinkedTooFar {
            stop: warned,
            distance_meters,
        } => {
            assert_eq!(*warned, stop);
            assert!(*distance_meters > 20.0 && *distance_meters < 100.0);
        }
        other => panic!("unexpected annotation {other:?}"),
    }
    assert_eq!(transit_links(&graph).len(), 2);
}

#[test]
fn test_linking_is_deterministic() {
    let build = || {
        let mut graph = StreetGraph::new();
        street(&mut graph, "a1", "b1", (0.0, 0.0), (0.001, 0.0));
        street(&mut graph, "b2", "a2", (0.001, 0.0), (0.0, 0.0));
        let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), true);
        let linker = StreetLinker::for_graph(&graph);
        let mut annotations: Vec<GraphAnnotation> = Vec::new();
        assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));
        graph
    };

    let first = build();
    let second = build();
    assert_eq!(edge_signature(&first), edge_signature(&second));
    let labels = |graph: &StreetGraph| {
        let mut labels: Vec<String> = graph
            .vertices()
            .map(|(_, v)| v.label().to_string())
            .collect();
        labels.sort();
        labels
    };
    assert_eq!(labels(&first), labels(&second));
}

#[test]
fn test_linking_is_permutation_invariant() {
    let build = || {
        let mut graph = StreetGraph::new();
        street(&mut graph, "a1", "b1", (0.0, 0.0), (0.001, 0.0));
        street(&mut graph, "a2", "b2", (0.01, 0.0), (0.011, 0.0));
        let near = graph.add_transit_stop("near", point!(x: 0.0005, y: 0.0001), false);
        let far = graph.add_transit_stop("far", point!(x: 0.0105, y: 0.0001), false);
        (graph, near, far)
    };

    let (mut forward, near, far) = build();
    let linker = StreetLinker::for_graph(&forward);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();
    assert!(linker.link_to_closest_walkable_edge(&mut forward, near, &mut annotations));
    assert!(linker.link_to_closest_walkable_edge(&mut forward, far, &mut annotations));

    let (mut backward, near, far) = build();
    let linker = StreetLinker::for_graph(&backward);
    assert!(linker.link_to_closest_walkable_edge(&mut backward, far, &mut annotations));
    assert!(linker.link_to_closest_walkable_edge(&mut backward, near, &mut annotations));

    assert_eq!(edge_signature(&forward), edge_signature(&backward));
}

#[test]
fn test_relinking_is_a_noop() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));
    let after_first = edge_signature(&graph);
    let count_after_first = graph.edge_count();

    // the second pass snaps onto the splitter and finds its links present
    assert!(linker.link_to_closest_walkable_edge(&mut graph, stop, &mut annotations));
    assert_eq!(graph.edge_count(), count_after_first);
    assert_eq!(edge_signature(&graph), after_first);
}

#[test]
fn test_links_are_bidirectional_with_matching_flags() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    graph.add_transit_stop("stop", point!(x: 0.0002, y: 0.0001), true);
    graph.add_bike_rental_station("rental", point!(x: 0.0005, y: 0.0001));
    graph.add_bike_park("park", point!(x: 0.0008, y: 0.0001));
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    linker.link_all(&mut graph, &mut annotations);

    assert!(annotations.is_empty());
    let links: Vec<(VertexId, VertexId, EdgeKind)> = graph
        .edges()
        .filter(|(_, e)| e.street_data().is_none())
        .map(|(_, e)| (e.from_vertex(), e.to_vertex(), e.kind().clone()))
        .collect();
    assert_eq!(links.len(), 6);
    for (from, to, kind) in &links {
        assert!(
            links.iter().any(|(f, t, k)| f == to && t == from && k == kind),
            "missing reverse of {from}->{to}"
        );
    }
}

#[test]
fn test_stale_index_entries_are_not_relinked() {
    let mut graph = StreetGraph::new();
    let (_, _, edge) = street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let first = graph.add_transit_stop("first", point!(x: 0.0004, y: 0.0001), false);
    let second = graph.add_transit_stop("second", point!(x: 0.0006, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph);
    let mut annotations: Vec<GraphAnnotation> = Vec::new();

    assert!(linker.link_to_closest_walkable_edge(&mut graph, first, &mut annotations));
    assert!(!graph.is_in_graph(edge));

    // the second search still sees the split edge in the index but must
    // link against the live halves only
    assert!(linker.link_to_closest_walkable_edge(&mut graph, second, &mut annotations));
    assert!(!graph.is_in_graph(edge));
    assert_eq!(splitter_vertices(&graph).len(), 2);
    for (from, to) in transit_links(&graph) {
        assert_ne!(graph.vertex(from).label(), "a");
        assert_ne!(graph.vertex(to).label(), "b");
    }
    assert_eq!(live_street_edge_count(&graph), 3);
}

#[test]
fn test_origin_link_leaves_graph_unchanged() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let linker = StreetLinker::for_graph(&graph);
    let before = graph.clone();

    let mut scratch = RequestScratch::new();
    let origin = link_origin_destination(
        &linker,
        &graph,
        &mut scratch,
        &GenericLocation::new(point!(x: 0.0005, y: 0.0001)),
        None,
        false,
    )
    .expect("origin linking does not signal");

    // temporary location, temporary splitter, two partial halves, one free
    // edge, and not a single permanent mutation
    assert_eq!(graph, before);
    assert_eq!(scratch.vertex_count(), 2);
    assert_eq!(scratch.edges().len(), 3);
    let free: Vec<_> = scratch
        .edges()
        .iter()
        .filter(|e| e.kind() == &TemporaryEdgeKind::FreeEdge)
        .collect();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].from_vertex(), VertexRef::Temporary(origin));

    drop(scratch);
    assert_eq!(graph, before);
}

#[test]
fn test_destination_free_edge_orientation_and_accessibility() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let linker = StreetLinker::for_graph(&graph);

    let mut scratch = RequestScratch::new();
    let destination = link_origin_destination(
        &linker,
        &graph,
        &mut scratch,
        &GenericLocation::named(point!(x: 0.0005, y: 0.0001), "Work"),
        None,
        true,
    )
    .expect("destination linking does not signal");

    // end vertex: the free edge points from the splitter at the location
    let free: Vec<_> = scratch
        .edges()
        .iter()
        .filter(|e| e.kind() == &TemporaryEdgeKind::FreeEdge)
        .collect();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].to_vertex(), VertexRef::Temporary(destination));

    // the street's accessibility reached the location through the splitter
    assert!(scratch.vertex(destination).wheelchair_accessible());
    assert!(matches!(
        scratch.vertex(destination).kind(),
        TemporaryVertexKind::StreetLocation { name, .. } if name == "Work"
    ));
}

#[test]
fn test_origin_falls_back_to_transit_stops() {
    let mut graph = StreetGraph::new();
    let stop = graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph).with_stop_index(StopIndex::build(&graph));
    let before = graph.clone();

    let mut scratch = RequestScratch::new();
    let origin = link_origin_destination(
        &linker,
        &graph,
        &mut scratch,
        &GenericLocation::new(point!(x: 0.0005, y: 0.0)),
        None,
        false,
    )
    .expect("fallback linking does not signal");

    assert_eq!(graph, before);
    assert_eq!(scratch.edges().len(), 1);
    let edge = &scratch.edges()[0];
    assert_eq!(edge.kind(), &TemporaryEdgeKind::FreeEdge);
    assert_eq!(edge.from_vertex(), VertexRef::Temporary(origin));
    assert_eq!(edge.to_vertex(), VertexRef::Graph(stop));
}

#[test]
fn test_origin_without_stop_index_stays_unlinked() {
    let mut graph = StreetGraph::new();
    graph.add_transit_stop("stop", point!(x: 0.0005, y: 0.0001), false);
    let linker = StreetLinker::for_graph(&graph);

    let mut scratch = RequestScratch::new();
    let origin = link_origin_destination(
        &linker,
        &graph,
        &mut scratch,
        &GenericLocation::new(point!(x: 0.0005, y: 0.0)),
        None,
        false,
    )
    .expect("an unlinked origin is not an error");

    assert!(scratch.edges().is_empty());
    assert!(matches!(
        scratch.vertex(origin).kind(),
        TemporaryVertexKind::StreetLocation { name, .. } if name == "Origin"
    ));
}

#[test]
fn test_same_edge_origin_destination_is_trivial_path() {
    let mut graph = StreetGraph::new();
    street(&mut graph, "a", "b", (0.0, 0.0), (0.001, 0.0));
    let linker = StreetLinker::for_graph(&graph);
    let request = RoutingRequest::new(walk());

    let mut scratch = RequestScratch::new();
    link_origin_destination(
        &linker,
        &graph,
        &mut scratch,
        &GenericLocation::new(point!(x: 0.0004, y: 0.0001)),
        Some(&request),
        false,
    )
    .expect("origin links cleanly");

    let destination = link_origin_destination(
        &linker,
        &graph,
        &mut scratch,
        &GenericLocation::new(point!(x: 0.0006, y: 0.0001)),
        Some(&request),
        true,
    );
    assert!(matches!(destination, Err(Error::TrivialPath)));
}
