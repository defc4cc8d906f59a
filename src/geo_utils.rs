//! # Geographic Utilities
//!
//! Distance and geometry helpers for walking routes.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`polyline_length`] | Total length of a route in meters |
//! | [`compute_bounds`] | Bounding box of a route |
//! | [`to_line_string`] | Route as a `geo::LineString` for map sources |
//!
//! ## Example
//!
//! ```rust
//! use route_progress::{Coordinate, geo_utils};
//!
//! let route = vec![
//!     Coordinate::new(41.1297, 14.7697),
//!     Coordinate::new(41.1305, 14.7710),
//!     Coordinate::new(41.1312, 14.7725),
//! ];
//!
//! let length = geo_utils::polyline_length(&route);
//! println!("Walk: {:.0}m", length);
//! ```
//!
//! ## Haversine Formula
//!
//! ```text
//! a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlng/2)
//! d = 2·R·atan2(√a, √(1−a))
//! ```
//!
//! with a spherical Earth of radius 6,371,000 m. All inputs are WGS84 degrees.

use geo::{Coord, LineString};

use crate::{Bounds, Coordinate};

/// Earth radius used by the route proximity checks, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates in meters.
///
/// Symmetric, and zero for identical points.
///
/// ```rust
/// use route_progress::{Coordinate, geo_utils};
///
/// // One degree of latitude along a meridian
/// let d = geo_utils::haversine_distance(
///     &Coordinate::new(0.0, 0.0),
///     &Coordinate::new(1.0, 0.0),
/// );
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &Coordinate, p2: &Coordinate) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lng = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Total length of a route in meters. Empty and single-point routes are 0.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Geometry
// =============================================================================

/// Bounding box of a route, or `None` for an empty slice.
pub fn compute_bounds(points: &[Coordinate]) -> Option<Bounds> {
    if points.is_empty() {
        return None;
    }

    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Some(Bounds { min_lat, max_lat, min_lng, max_lng })
}

/// Convert a route to a line string (x = longitude, y = latitude), the
/// geometry a map line-layer source expects.
pub fn to_line_string(points: &[Coordinate]) -> LineString<f64> {
    LineString::new(points.iter().map(|p| Coord::from(*p)).collect())
}

// =============================================================================
// Unit Tests
// =============================================================================
