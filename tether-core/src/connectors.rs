use geo::Point;
use log::warn;

use crate::graph::StreetGraph;
use crate::linker::StreetLinker;
use crate::request::{RoutingRequest, TraverseMode};
use crate::temporary::{RequestScratch, TempVertexId};
use crate::Error;

/// A user-supplied location: a coordinate plus an optional display name.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericLocation {
    pub geometry: Point<f64>,
    pub name: Option<String>,
}

impl GenericLocation {
    #[must_use]
    pub const fn new(geometry: Point<f64>) -> Self {
        Self {
            geometry,
            name: None,
        }
    }

    #[must_use]
    pub fn named(geometry: Point<f64>, name: impl Into<String>) -> Self {
        Self {
            geometry,
            name: Some(name.into()),
        }
    }
}

/// Wrap `location` in a temporary street location owned by `scratch` and
/// link it into the graph non-destructively. The temporary vertex is
/// returned even when nothing is in range; an unlinked origin simply
/// yields no itineraries later on.
///
/// # Errors
/// Propagates the trivial-path signal raised when origin and destination
/// project onto the same street edge.
pub fn link_origin_destination(
    linker: &StreetLinker,
    graph: &StreetGraph,
    scratch: &mut RequestScratch,
    location: &GenericLocation,
    options: Option<&RoutingRequest>,
    end_vertex: bool,
) -> Result<TempVertexId, Error> {
    let name = location.name.clone().unwrap_or_else(|| {
        if end_vertex {
            "Destination".to_string()
        } else {
            "Origin".to_string()
        }
    });
    let temporary = scratch.add_street_location(name, location.geometry, end_vertex);
    let mode = non_transit_mode(options, end_vertex);
    if !linker.link_temporarily(graph, scratch, temporary, mode, options)? {
        warn!(
            "could not link {} at ({}, {}) to the street network",
            scratch.vertex(temporary).label(),
            location.geometry.x(),
            location.geometry.y()
        );
    }
    Ok(temporary)
}

/// Pick the non-transit traversal mode of an origin/destination link.
///
/// Car wins whenever the request allows it, except that the end vertex of
/// a park-and-ride or kiss-and-ride trip is reached on foot; walk and
/// bicycle are consulted only when car is absent.
fn non_transit_mode(options: Option<&RoutingRequest>, end_vertex: bool) -> TraverseMode {
    let mut mode = TraverseMode::Walk;
    if let Some(options) = options {
        let modes = options.modes;
        if modes.car {
            mode = if end_vertex && (options.park_and_ride || options.kiss_and_ride) {
                TraverseMode::Walk
            } else {
                TraverseMode::Car
            };
        } else if modes.walk {
            mode = TraverseMode::Walk;
        } else if modes.bicycle {
            mode = TraverseMode::Bicycle;
        }
    }
    mode
}
