//! Planar geometry for linking: a local equirectangular frame around each
//! query point, distances measured in degrees of latitude, and linear
//! referencing along edge polylines.
//!
//! The equirectangular approximation scales longitudes by the cosine of the
//! reference latitude and leaves latitudes alone. Within the linker's search
//! radius it tracks the true ground distance closely, is monotonic, and is
//! much cheaper than a great-circle formula.

use std::f64::consts::PI;

use geo::{Coord, LineString, Point};
use itertools::Itertools;

const MEAN_EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Longitude scale factor of the local frame at latitude `lat`.
#[must_use]
pub fn lon_scale(lat: f64) -> f64 {
    lat.to_radians().cos()
}

/// Ground distance in meters expressed as degrees of latitude.
#[must_use]
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters * 360.0 / (2.0 * PI * MEAN_EARTH_RADIUS_METERS)
}

/// Degrees of latitude expressed as ground meters.
#[must_use]
pub fn degrees_to_meters(degrees: f64) -> f64 {
    degrees * 2.0 * PI * MEAN_EARTH_RADIUS_METERS / 360.0
}

/// A point along a polyline: segment index plus fraction within that
/// segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LinearLocation {
    pub segment: usize,
    pub fraction: f64,
}

/// Projected distance between two points, in degrees of latitude.
#[must_use]
pub fn point_distance(a: Point<f64>, b: Point<f64>, xscale: f64) -> f64 {
    let dx = (a.x() - b.x()) * xscale;
    let dy = a.y() - b.y();
    dx.hypot(dy)
}

/// Projected distance from `point` to `geometry`, in degrees of latitude.
#[must_use]
pub fn linestring_distance(point: Point<f64>, geometry: &LineString<f64>, xscale: f64) -> f64 {
    closest_location(point, geometry, xscale).1
}

/// Linear location of the point of `geometry` closest to `point` in the
/// local frame. Ties keep the earliest segment, so the result does not
/// depend on accumulation order.
#[must_use]
pub fn locate(point: Point<f64>, geometry: &LineString<f64>, xscale: f64) -> LinearLocation {
    closest_location(point, geometry, xscale).0
}

fn closest_location(
    point: Point<f64>,
    geometry: &LineString<f64>,
    xscale: f64,
) -> (LinearLocation, f64) {
    let mut best = (
        LinearLocation {
            segment: 0,
            fraction: 0.0,
        },
        f64::INFINITY,
    );
    for (segment, line) in geometry.lines().enumerate() {
        let (fraction, distance) = project_on_segment(point, line.start, line.end, xscale);
        if distance < best.1 {
            best = (LinearLocation { segment, fraction }, distance);
        }
    }
    best
}

fn project_on_segment(
    point: Point<f64>,
    start: Coord<f64>,
    end: Coord<f64>,
    xscale: f64,
) -> (f64, f64) {
    let px = (point.x() - start.x) * xscale;
    let py = point.y() - start.y;
    let ex = (end.x - start.x) * xscale;
    let ey = end.y - start.y;
    let len2 = ex * ex + ey * ey;
    let fraction = if len2 > 0.0 {
        ((px * ex + py * ey) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = px - fraction * ex;
    let dy = py - fraction * ey;
    (fraction, dx.hypot(dy))
}

/// Coordinate of `location` on `geometry`, in the unprojected frame.
#[must_use]
pub fn point_at(geometry: &LineString<f64>, location: LinearLocation) -> Coord<f64> {
    let start = geometry.0[location.segment];
    let end = geometry.0[location.segment + 1];
    Coord {
        x: start.x + (end.x - start.x) * location.fraction,
        y: start.y + (end.y - start.y) * location.fraction,
    }
}

/// Split `geometry` at `location`, duplicating the split coordinate onto
/// both halves.
#[must_use]
pub fn split_linestring(
    geometry: &LineString<f64>,
    location: LinearLocation,
) -> (LineString<f64>, LineString<f64>) {
    let split = point_at(geometry, location);
    let mut first: Vec<Coord<f64>> = geometry.0[..=location.segment].to_vec();
    first.push(split);
    let mut second: Vec<Coord<f64>> = vec![split];
    second.extend_from_slice(&geometry.0[location.segment + 1..]);
    (LineString::new(first), LineString::new(second))
}

/// Fraction of `geometry`'s projected length lying before `location`.
#[must_use]
pub fn length_fraction(geometry: &LineString<f64>, location: LinearLocation, xscale: f64) -> f64 {
    let mut before = 0.0;
    let mut total = 0.0;
    for (segment, line) in geometry.lines().enumerate() {
        let dx = (line.end.x - line.start.x) * xscale;
        let dy = line.end.y - line.start.y;
        let length = dx.hypot(dy);
        if segment < location.segment {
            before += length;
        } else if segment == location.segment {
            before += length * location.fraction;
        }
        total += length;
    }
    if total > 0.0 {
        before / total
    } else {
        0.0
    }
}

/// Split an elevation profile of `(fraction, meters)` samples at
/// `fraction`, interpolating a sample at the cut. Sample positions in each
/// half are rescaled to span `0..=1` again, so splitting never drops
/// elevation data.
#[must_use]
pub fn split_elevation(profile: &[(f64, f64)], fraction: f64) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let cut = elevation_at(profile, fraction);
    let mut first: Vec<(f64, f64)> = profile
        .iter()
        .copied()
        .filter(|&(x, _)| x < fraction)
        .map(|(x, elevation)| {
            let rescaled = if fraction > 0.0 { x / fraction } else { 0.0 };
            (rescaled, elevation)
        })
        .collect();
    first.push((1.0, cut));
    let mut second = vec![(0.0, cut)];
    second.extend(
        profile
            .iter()
            .copied()
            .filter(|&(x, _)| x > fraction)
            .map(|(x, elevation)| {
                let rescaled = if fraction < 1.0 {
                    (x - fraction) / (1.0 - fraction)
                } else {
                    1.0
                };
                (rescaled, elevation)
            }),
    );
    (first, second)
}

fn elevation_at(profile: &[(f64, f64)], fraction: f64) -> f64 {
    let bracket = profile
        .iter()
        .tuple_windows()
        .find(|(&(x0, _), &(x1, _))| x0 <= fraction && fraction <= x1);
    if let Some((&(x0, e0), &(x1, e1))) = bracket {
        if x1 > x0 {
            return e0 + (e1 - e0) * (fraction - x0) / (x1 - x0);
        }
        return e0;
    }
    // outside the sampled range: clamp to the nearest sample
    if profile.first().is_some_and(|&(x0, _)| fraction < x0) {
        return profile[0].1;
    }
    profile.last().map_or(0.0, |&(_, e)| e)
}
