//! Error type shared by the navigation pipeline, the weather cache and the
//! HTTP clients.
//!
//! Pure routines (polyline decoding, distance, proximity matching) never
//! return errors; they degrade to empty or "no progress" results instead.

use thiserror::Error;

/// Errors surfaced by stateful navigation operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum NavigationError {
    /// The route has fewer than two points and cannot be drawn as a line.
    #[error("route too short: {points} point(s), need at least 2")]
    RouteTooShort { points: u32 },

    /// An encoded polyline decoded to nothing.
    #[error("polyline decoded to no coordinates")]
    EmptyPolyline,

    /// The map surface failed to add, replace or remove the route layer.
    #[error("map rendering failed: {0}")]
    Render(String),

    /// The location provider refused to start or stop updates.
    #[error("location updates unavailable: {0}")]
    Location(String),

    /// Transport or status failure talking to a remote service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The routing service answered but returned no route.
    #[error("no route found")]
    NoRoute,

    /// Reading or writing the local cache failed.
    #[error("cache error: {0}")]
    Cache(String),
}

impl From<serde_json::Error> for NavigationError {
    fn from(e: serde_json::Error) -> Self {
        NavigationError::Cache(e.to_string())
    }
}

impl From<std::io::Error> for NavigationError {
    fn from(e: std::io::Error) -> Self {
        NavigationError::Cache(e.to_string())
    }
}
