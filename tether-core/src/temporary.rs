//! Per-request temporary entities.
//!
//! A routing request links its origin and destination non-destructively:
//! every vertex or edge created on the way lands in the
//! [`RequestScratch`] owned by that request and disappears with it, leaving
//! the permanent graph bit-identical to its pre-request state. Temporaries
//! may reference permanent vertices; permanent entities never reference
//! temporaries.

use std::fmt::{self, Display};

use geo::{LineString, Point};

use crate::graph::VertexId;
use crate::request::TraverseModeSet;

/// Index of a temporary vertex in a request's scratch arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TempVertexId(u32);

impl TempVertexId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for TempVertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Endpoint of a temporary edge: a permanent graph vertex or another
/// temporary vertex.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VertexRef {
    Graph(VertexId),
    Temporary(TempVertexId),
}

/// Enum representing the kind of a temporary vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum TemporaryVertexKind {
    /// Ephemeral origin or destination of a single request.
    StreetLocation {
        name: String,
        end_vertex: bool,
        wheelchair_accessible: bool,
    },
    /// Ephemeral splitter introduced by a non-destructive split.
    Splitter {
        end_vertex: bool,
        wheelchair_accessible: bool,
    },
}

/// A temporary vertex owned by one request.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporaryVertex {
    label: String,
    geometry: Point<f64>,
    kind: TemporaryVertexKind,
}

impl TemporaryVertex {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn geometry(&self) -> &Point<f64> {
        &self.geometry
    }

    #[must_use]
    pub const fn kind(&self) -> &TemporaryVertexKind {
        &self.kind
    }

    /// Whether this temporary marks the end (destination) of the request.
    #[must_use]
    pub const fn is_end_vertex(&self) -> bool {
        match &self.kind {
            TemporaryVertexKind::StreetLocation { end_vertex, .. }
            | TemporaryVertexKind::Splitter { end_vertex, .. } => *end_vertex,
        }
    }

    #[must_use]
    pub const fn wheelchair_accessible(&self) -> bool {
        match &self.kind {
            TemporaryVertexKind::StreetLocation {
                wheelchair_accessible,
                ..
            }
            | TemporaryVertexKind::Splitter {
                wheelchair_accessible,
                ..
            } => *wheelchair_accessible,
        }
    }
}

/// Enum representing the kind of a temporary edge.
#[derive(Debug, Clone, PartialEq)]
pub enum TemporaryEdgeKind {
    /// Zero-length connection between a temporary location and its link
    /// target.
    FreeEdge,
    /// Half of a non-destructively split street edge.
    PartialStreet {
        geometry: LineString<f64>,
        permissions: TraverseModeSet,
        wheelchair_accessible: bool,
    },
}

/// A directed temporary edge owned by one request.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporaryEdge {
    from: VertexRef,
    to: VertexRef,
    kind: TemporaryEdgeKind,
}

impl TemporaryEdge {
    #[must_use]
    pub const fn from_vertex(&self) -> VertexRef {
        self.from
    }

    #[must_use]
    pub const fn to_vertex(&self) -> VertexRef {
        self.to
    }

    #[must_use]
    pub const fn kind(&self) -> &TemporaryEdgeKind {
        &self.kind
    }
}

/// Arena of the temporary entities created while linking one request.
/// Dropping the scratch tears all of them down at once.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RequestScratch {
    vertices: Vec<TemporaryVertex>,
    edges: Vec<TemporaryEdge>,
}

impl RequestScratch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize a temporary street location with a fresh request-scoped
    /// label. `name` is the display name shown to the user.
    pub fn add_street_location(
        &mut self,
        name: impl Into<String>,
        geometry: Point<f64>,
        end_vertex: bool,
    ) -> TempVertexId {
        let id = TempVertexId(self.vertices.len() as u32);
        self.vertices.push(TemporaryVertex {
            label: format!("temporary-{}", self.vertices.len()),
            geometry,
            kind: TemporaryVertexKind::StreetLocation {
                name: name.into(),
                end_vertex,
                wheelchair_accessible: false,
            },
        });
        id
    }

    pub(crate) fn add_splitter(
        &mut self,
        label: String,
        geometry: Point<f64>,
        end_vertex: bool,
        wheelchair_accessible: bool,
    ) -> TempVertexId {
        let id = TempVertexId(self.vertices.len() as u32);
        self.vertices.push(TemporaryVertex {
            label,
            geometry,
            kind: TemporaryVertexKind::Splitter {
                end_vertex,
                wheelchair_accessible,
            },
        });
        id
    }

    pub(crate) fn add_free_edge(&mut self, from: VertexRef, to: VertexRef) {
        self.edges.push(TemporaryEdge {
            from,
            to,
            kind: TemporaryEdgeKind::FreeEdge,
        });
    }

    pub(crate) fn add_partial_street(
        &mut self,
        from: VertexRef,
        to: VertexRef,
        geometry: LineString<f64>,
        permissions: TraverseModeSet,
        wheelchair_accessible: bool,
    ) {
        self.edges.push(TemporaryEdge {
            from,
            to,
            kind: TemporaryEdgeKind::PartialStreet {
                geometry,
                permissions,
                wheelchair_accessible,
            },
        });
    }

    /// Propagate accessibility onto a temporary street location.
    pub(crate) fn set_wheelchair_accessible(&mut self, id: TempVertexId, value: bool) {
        match &mut self.vertices[id.index()].kind {
            TemporaryVertexKind::StreetLocation {
                wheelchair_accessible,
                ..
            }
            | TemporaryVertexKind::Splitter {
                wheelchair_accessible,
                ..
            } => *wheelchair_accessible = value,
        }
    }

    #[must_use]
    pub fn vertex(&self, id: TempVertexId) -> &TemporaryVertex {
        &self.vertices[id.index()]
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn edges(&self) -> &[TemporaryEdge] {
        &self.edges
    }

    pub fn vertices(&self) -> impl Iterator<Item = (TempVertexId, &TemporaryVertex)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (TempVertexId(i as u32), v))
    }
}
