/*!
This module defines the `StreetGraph` arena and the vertex/edge model the linker operates on.

# Structs
- `StreetGraph`: vertex and edge arena with per-vertex adjacency lists.
- `Vertex`: a labelled coordinate with adjacency and a `VertexKind` tag.
- `Edge`: a directed connection between two vertices with an `EdgeKind` tag.
- `StreetEdgeData`: payload of a traversable edge: polyline geometry, mode
  permissions, wheelchair flag, optional elevation profile.

# Enums
- `VertexKind`: `Street`, `Splitter`, `TransitStop`, `BikeRentalStation`, `BikePark`.
- `EdgeKind`: `Street` plus the three permanent link-edge kinds.

Edge ids are stable for the lifetime of the graph: a destructive split
detaches the original edge from both endpoints' adjacency but never frees
its arena slot, so a stale spatial-index entry can never alias a live edge.
*/

use std::fmt::{self, Display};

use geo::{LineString, Point};
use log::warn;

use crate::request::TraverseModeSet;
use crate::Error;

/// Index of a vertex in the graph arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct VertexId(u32);

impl VertexId {
    /// Cast to `usize` for direct use as an arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an edge in the graph arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EdgeId(u32);

impl EdgeId {
    /// Cast to `usize` for direct use as an arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Enum representing the kind of a permanent vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexKind {
    /// A street intersection.
    Street,
    /// Permanent vertex introduced at the interior of a former edge to
    /// serve as a link anchor.
    Splitter,
    /// A transit stop waiting to be linked to the street network.
    TransitStop { wheelchair_accessible: bool },
    /// A bike-rental station.
    BikeRentalStation,
    /// A bike-park location.
    BikePark,
}

/// A permanent vertex of the street graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    label: String,
    geometry: Point<f64>,
    kind: VertexKind,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

impl Vertex {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn geometry(&self) -> &Point<f64> {
        &self.geometry
    }

    #[must_use]
    pub const fn kind(&self) -> &VertexKind {
        &self.kind
    }

    /// Edges arriving at this vertex.
    #[must_use]
    pub fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    /// Edges leaving this vertex.
    #[must_use]
    pub fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }
}

/// Payload of a traversable street edge.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetEdgeData {
    geometry: LineString<f64>,
    permissions: TraverseModeSet,
    wheelchair_accessible: bool,
    /// Elevation samples as `(fraction along the edge, meters)` pairs,
    /// sorted by fraction.
    elevation: Option<Vec<(f64, f64)>>,
}

impl StreetEdgeData {
    pub(crate) const fn new(
        geometry: LineString<f64>,
        permissions: TraverseModeSet,
        wheelchair_accessible: bool,
        elevation: Option<Vec<(f64, f64)>>,
    ) -> Self {
        Self {
            geometry,
            permissions,
            wheelchair_accessible,
            elevation,
        }
    }

    #[must_use]
    pub const fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    #[must_use]
    pub const fn permissions(&self) -> TraverseModeSet {
        self.permissions
    }

    #[must_use]
    pub const fn wheelchair_accessible(&self) -> bool {
        self.wheelchair_accessible
    }

    #[must_use]
    pub fn elevation(&self) -> Option<&[(f64, f64)]> {
        self.elevation.as_deref()
    }

    /// Whether any mode in `modes` may traverse this edge.
    #[must_use]
    pub fn can_traverse(&self, modes: TraverseModeSet) -> bool {
        self.permissions.intersects(modes)
    }
}

/// Enum representing the kind of a permanent edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    /// A traversable piece of street.
    Street(StreetEdgeData),
    /// Connection between a transit stop and the street network.
    StreetTransitLink { wheelchair_accessible: bool },
    /// Connection between a bike-rental station and the street network.
    StreetBikeRentalLink,
    /// Connection between a bike park and the street network.
    StreetBikeParkLink,
}

/// A directed permanent edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    from: VertexId,
    to: VertexId,
    kind: EdgeKind,
}

impl Edge {
    #[must_use]
    pub const fn from_vertex(&self) -> VertexId {
        self.from
    }

    #[must_use]
    pub const fn to_vertex(&self) -> VertexId {
        self.to
    }

    #[must_use]
    pub const fn kind(&self) -> &EdgeKind {
        &self.kind
    }

    /// Street payload of this edge, or `None` for link edges.
    #[must_use]
    pub const fn street_data(&self) -> Option<&StreetEdgeData> {
        match &self.kind {
            EdgeKind::Street(data) => Some(data),
            _ => None,
        }
    }
}

/// Arena-backed street graph: vertices, edges, and adjacency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl StreetGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a street intersection.
    pub fn add_street_vertex(&mut self, label: impl Into<String>, geometry: Point<f64>) -> VertexId {
        self.add_vertex(label.into(), geometry, VertexKind::Street)
    }

    /// Add a transit stop. Stops start out unlinked; the linker attaches
    /// them to the street network.
    pub fn add_transit_stop(
        &mut self,
        label: impl Into<String>,
        geometry: Point<f64>,
        wheelchair_accessible: bool,
    ) -> VertexId {
        self.add_vertex(
            label.into(),
            geometry,
            VertexKind::TransitStop {
                wheelchair_accessible,
            },
        )
    }

    /// Add a bike-rental station.
    pub fn add_bike_rental_station(
        &mut self,
        label: impl Into<String>,
        geometry: Point<f64>,
    ) -> VertexId {
        self.add_vertex(label.into(), geometry, VertexKind::BikeRentalStation)
    }

    /// Add a bike park.
    pub fn add_bike_park(&mut self, label: impl Into<String>, geometry: Point<f64>) -> VertexId {
        self.add_vertex(label.into(), geometry, VertexKind::BikePark)
    }

    pub(crate) fn add_vertex(
        &mut self,
        label: String,
        geometry: Point<f64>,
        kind: VertexKind,
    ) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(Vertex {
            label,
            geometry,
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        id
    }

    /// Add a traversable street edge.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] when `geometry` has fewer than
    /// two coordinates.
    pub fn add_street_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        geometry: LineString<f64>,
        permissions: TraverseModeSet,
        wheelchair_accessible: bool,
    ) -> Result<EdgeId, Error> {
        self.add_street_edge_inner(from, to, geometry, permissions, wheelchair_accessible, None)
    }

    /// Add a traversable street edge carrying an elevation profile of
    /// `(fraction along the edge, meters)` samples.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] when `geometry` has fewer than
    /// two coordinates or `elevation` is empty.
    pub fn add_street_edge_with_elevation(
        &mut self,
        from: VertexId,
        to: VertexId,
        geometry: LineString<f64>,
        permissions: TraverseModeSet,
        wheelchair_accessible: bool,
        elevation: Vec<(f64, f64)>,
    ) -> Result<EdgeId, Error> {
        if elevation.is_empty() {
            return Err(Error::InvalidGeometry(
                "elevation profile must hold at least one sample".to_string(),
            ));
        }
        self.add_street_edge_inner(
            from,
            to,
            geometry,
            permissions,
            wheelchair_accessible,
            Some(elevation),
        )
    }

    fn add_street_edge_inner(
        &mut self,
        from: VertexId,
        to: VertexId,
        geometry: LineString<f64>,
        permissions: TraverseModeSet,
        wheelchair_accessible: bool,
        elevation: Option<Vec<(f64, f64)>>,
    ) -> Result<EdgeId, Error> {
        if geometry.0.len() < 2 {
            return Err(Error::InvalidGeometry(format!(
                "street edge geometry needs at least two coordinates, got {}",
                geometry.0.len()
            )));
        }
        Ok(self.add_edge(
            from,
            to,
            EdgeKind::Street(StreetEdgeData::new(
                geometry,
                permissions,
                wheelchair_accessible,
                elevation,
            )),
        ))
    }

    /// Add one half of a split edge, inheriting everything but geometry and
    /// elevation from the original's payload.
    pub(crate) fn add_split_half(
        &mut self,
        from: VertexId,
        to: VertexId,
        geometry: LineString<f64>,
        original: &StreetEdgeData,
        elevation: Option<Vec<(f64, f64)>>,
    ) -> EdgeId {
        self.add_edge(
            from,
            to,
            EdgeKind::Street(StreetEdgeData::new(
                geometry,
                original.permissions(),
                original.wheelchair_accessible(),
                elevation,
            )),
        )
    }

    pub(crate) fn add_edge(&mut self, from: VertexId, to: VertexId, kind: EdgeKind) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge { from, to, kind });
        self.vertices[from.index()].outgoing.push(id);
        self.vertices[to.index()].incoming.push(id);
        id
    }

    /// Detach `edge` from both endpoints' adjacency. The arena slot and the
    /// edge data stay, so the id keeps resolving and spatial-index entries
    /// pointing at it simply become stale.
    pub(crate) fn detach_edge(&mut self, edge: EdgeId) {
        let (from, to) = {
            let e = &self.edges[edge.index()];
            (e.from, e.to)
        };
        self.vertices[to.index()].incoming.retain(|&e| e != edge);
        self.vertices[from.index()].outgoing.retain(|&e| e != edge);
    }

    /// An edge is live while its `to` vertex still lists it as incoming.
    /// Spatial-index query results must be filtered through this.
    #[must_use]
    pub fn is_in_graph(&self, edge: EdgeId) -> bool {
        let e = &self.edges[edge.index()];
        self.vertices[e.to.index()].incoming.contains(&edge)
    }

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(|i| VertexId(i as u32))
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexId(i as u32), v))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeId(i as u32), e))
    }

    /// Edges leaving `vertex`.
    #[must_use]
    pub fn outgoing(&self, vertex: VertexId) -> &[EdgeId] {
        &self.vertices[vertex.index()].outgoing
    }

    /// Edges arriving at `vertex`.
    #[must_use]
    pub fn incoming(&self, vertex: VertexId) -> &[EdgeId] {
        &self.vertices[vertex.index()].incoming
    }
}

/// Build-time annotation describing a linking outcome worth surfacing.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphAnnotation {
    StopUnlinked(VertexId),
    BikeRentalStationUnlinked(VertexId),
    BikeParkUnlinked(VertexId),
    StopLinkedTooFar {
        stop: VertexId,
        distance_meters: f64,
    },
}

impl Display for GraphAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopUnlinked(v) => {
                write!(f, "transit stop {v} could not be linked to the street network")
            }
            Self::BikeRentalStationUnlinked(v) => {
                write!(f, "bike-rental station {v} could not be linked to the street network")
            }
            Self::BikeParkUnlinked(v) => {
                write!(f, "bike park {v} could not be linked to the street network")
            }
            Self::StopLinkedTooFar {
                stop,
                distance_meters,
            } => {
                write!(f, "transit stop {stop} linked {distance_meters:.1} m away from the nearest street")
            }
        }
    }
}

/// Receiver of linking annotations.
pub trait AnnotationSink {
    fn report(&mut self, annotation: GraphAnnotation);
}

/// Collecting sink, used by builds that post-process annotations and by
/// tests.
impl AnnotationSink for Vec<GraphAnnotation> {
    fn report(&mut self, annotation: GraphAnnotation) {
        self.push(annotation);
    }
}

/// Sink that forwards every annotation to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AnnotationSink for LogSink {
    fn report(&mut self, annotation: GraphAnnotation) {
        warn!("{annotation}");
    }
}
