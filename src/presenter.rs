//! # Route Presenter
//!
//! Hands the remaining route to the map as a named line layer backed by a
//! line-string source, and decides when a redraw is due.
//!
//! The presenter holds no session state. The redraw throttle compares the
//! session's last redraw time against the configured interval; the tracker
//! decides what to do with the answer.

use geo::LineString;
use log::{debug, warn};

use crate::error::NavigationError;
use crate::geo_utils::to_line_string;
use crate::Coordinate;

/// Default minimum time between two route redraws.
pub const DEFAULT_REDRAW_INTERVAL_MS: i64 = 2_000;

/// Minimum number of points a drawable route needs.
pub const MIN_ROUTE_POINTS: usize = 2;

/// Names and paint properties of the route layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteStyle {
    /// Id of the line layer. Default: "route-layer"
    pub layer_id: String,
    /// Id of the geometry source the layer draws. Default: "route-source"
    pub source_id: String,
    /// Line color as a hex string. Default: "#007AFF"
    pub line_color: String,
    /// Line width in screen pixels. Default: 5.0
    pub line_width: f64,
}

impl Default for RouteStyle {
    fn default() -> Self {
        Self {
            layer_id: "route-layer".to_string(),
            source_id: "route-source".to_string(),
            line_color: "#007AFF".to_string(),
            line_width: 5.0,
        }
    }
}

/// The map the route is drawn on.
///
/// Implementations own the UI-thread boundary: position updates reach the
/// presenter from a background context, so `show_route` and `clear_route`
/// must post their work to the main thread before touching map state and
/// report its result. The tracker calls them with its session lock released,
/// so blocking on the UI thread and calling back into the tracker are both
/// allowed.
pub trait MapSurface: Send + Sync {
    /// Add the layer and source, replacing them if they already exist.
    fn show_route(&self, style: &RouteStyle, geometry: &LineString<f64>) -> Result<(), NavigationError>;

    /// Remove the layer and source if present.
    fn clear_route(&self, style: &RouteStyle) -> Result<(), NavigationError>;
}

impl<M: MapSurface + ?Sized> MapSurface for std::sync::Arc<M> {
    fn show_route(&self, style: &RouteStyle, geometry: &LineString<f64>) -> Result<(), NavigationError> {
        (**self).show_route(style, geometry)
    }

    fn clear_route(&self, style: &RouteStyle) -> Result<(), NavigationError> {
        (**self).clear_route(style)
    }
}

/// Result of a redraw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PresentOutcome {
    /// The route was handed to the map.
    Redrawn,
    /// Too soon after the last redraw; the map keeps its current route.
    Throttled,
    /// Fewer than two points remain, so there is nothing left to draw.
    Complete,
}

pub struct RoutePresenter<M: MapSurface> {
    surface: M,
    style: RouteStyle,
    redraw_interval_ms: i64,
}

impl<M: MapSurface> RoutePresenter<M> {
    pub fn new(surface: M, style: RouteStyle, redraw_interval_ms: i64) -> Self {
        Self { surface, style, redraw_interval_ms }
    }

    pub fn style(&self) -> &RouteStyle {
        &self.style
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    /// True when at least the redraw interval has passed since `last_redraw_ms`.
    pub fn is_due(&self, last_redraw_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(last_redraw_ms) >= self.redraw_interval_ms
    }

    /// Draw `route`, replacing whatever route the map currently shows.
    pub fn draw(&self, route: &[Coordinate]) -> Result<(), NavigationError> {
        if route.len() < MIN_ROUTE_POINTS {
            return Err(NavigationError::RouteTooShort { points: route.len() as u32 });
        }

        let geometry = to_line_string(route);
        self.surface.show_route(&self.style, &geometry).map_err(|e| {
            warn!("[RoutePresenter] Failed to draw {} points: {}", route.len(), e);
            e
        })?;

        debug!("[RoutePresenter] Drew route with {} points", route.len());
        Ok(())
    }

    /// Remove the route from the map.
    pub fn clear(&self) -> Result<(), NavigationError> {
        self.surface.clear_route(&self.style)
    }
}
