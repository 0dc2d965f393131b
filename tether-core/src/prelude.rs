//! Commonly used items, re-exported for hosts of the linker.

pub use crate::connectors::{link_origin_destination, GenericLocation};
pub use crate::graph::{
    AnnotationSink, Edge, EdgeId, EdgeKind, GraphAnnotation, LogSink, StreetGraph, Vertex,
    VertexId, VertexKind,
};
pub use crate::index::{EdgeIndex, StopIndex};
pub use crate::linker::StreetLinker;
pub use crate::request::{RoutingRequest, TraverseMode, TraverseModeSet};
pub use crate::temporary::{
    RequestScratch, TempVertexId, TemporaryEdge, TemporaryEdgeKind, TemporaryVertex,
    TemporaryVertexKind, VertexRef,
};
pub use crate::Error;
