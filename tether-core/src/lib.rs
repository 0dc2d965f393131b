/*!
# Tether

**Tether** is the street-network linker of a multimodal routing stack.
It attaches point-like entities (transit stops, bike-rental stations,
bike parks, and per-request origin/destination points) to the nearest
traversable edges of a street graph, splitting those edges at the
projected point when the entity does not land on an intersection.

Linking runs in two regimes with identical geometric semantics:

- **destructive**, during a graph build: the split edge is permanently
  replaced by its two halves and the halves are registered in the
  spatial index;
- **non-destructive**, while answering a single routing request: the
  permanent graph is left untouched, and every vertex or edge created
  on the way lives in a per-request [`temporary::RequestScratch`] that
  is dropped as a unit when the request completes.

# Example
```ignore
use tether_core::prelude::*;
use geo::{line_string, point};

let mut graph = StreetGraph::new();
let a = graph.add_street_vertex("osm:1", point!(x: 0.0, y: 0.0));
let b = graph.add_street_vertex("osm:2", point!(x: 0.001, y: 0.0));
graph.add_street_edge(
    a,
    b,
    line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)],
    TraverseModeSet::of(TraverseMode::Walk),
    true,
)?;
let stop = graph.add_transit_stop("stop:42", point!(x: 0.0005, y: 0.0001), true);

let linker = StreetLinker::for_graph(&graph);
let mut annotations: Vec<GraphAnnotation> = Vec::new();
linker.link_all(&mut graph, &mut annotations);
```
*/

use thiserror::Error;

pub mod connectors;
pub mod geometry;
pub mod graph;
pub mod index;
pub mod linker;
pub mod prelude;
pub mod request;
pub mod splitter;
pub mod temporary;

/// Entities further than this from every traversable edge stay unlinked.
pub const MAX_SEARCH_RADIUS_METERS: f64 = 1000.0;

/// A transit stop linked further than this from the street network gets a
/// [`graph::GraphAnnotation::StopLinkedTooFar`] annotation.
pub const WARNING_DISTANCE_METERS: f64 = 20.0;

/// Candidate edges whose distances to the query point differ by less than
/// this are all linked, so the paired one-way carriageways of a divided
/// road are picked up together no matter how the floating-point ties fall.
pub const DUPLICATE_WAY_EPSILON_METERS: f64 = 0.001;

/// Projections closer than this (in segment-fraction units) to an edge
/// endpoint snap to the endpoint instead of splitting the edge.
pub const ENDPOINT_SNAP_EPSILON: f64 = 1e-8;

/// Error type for the linker.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("origin and destination fall on the same street edge")]
    TrivialPath,
}
