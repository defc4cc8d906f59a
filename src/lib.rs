//! # Route Progress
//!
//! Walking-route navigation core for the museum guide apps.
//!
//! This library provides:
//! - Decoding (and encoding) of OSRM `polyline6` route geometry
//! - Proximity matching that decides how much of a route has been walked
//! - A navigation tracker that trims the route as the user advances and
//!   redraws it on the map at most every two seconds
//! - A time-limited cache for weather reports
//!
//! ## Features
//!
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`http`** - Enable HTTP clients for the routing and weather services
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_progress::{
//!     Coordinate, MapSurface, NavigationConfig, NavigationError, NavigationTracker,
//!     PositionSample, RouteStyle, TrackerEvent,
//! };
//!
//! struct NoMap;
//!
//! impl MapSurface for NoMap {
//!     fn show_route(&self, _: &RouteStyle, _: &geo::LineString<f64>) -> Result<(), NavigationError> {
//!         Ok(())
//!     }
//!     fn clear_route(&self, _: &RouteStyle) -> Result<(), NavigationError> {
//!         Ok(())
//!     }
//! }
//!
//! let route = vec![
//!     Coordinate::new(41.1297, 14.7697),
//!     Coordinate::new(41.1307, 14.7697),
//!     Coordinate::new(41.1317, 14.7697),
//! ];
//!
//! let tracker = NavigationTracker::new(NoMap, NavigationConfig::default());
//! tracker.start(route).unwrap();
//!
//! let event = tracker.on_position(PositionSample::new(Coordinate::new(41.1317, 14.7697), 0));
//! assert_eq!(event, TrackerEvent::DestinationReached);
//! ```

use geo::Coord;
use serde::{Deserialize, Serialize};

pub mod clock;
pub mod error;
pub mod geo_utils;
pub mod matcher;
pub mod polyline;
pub mod presenter;
pub mod session;
pub mod tracker;
pub mod weather;

// HTTP clients for the routing and weather services
#[cfg(feature = "http")]
pub mod http;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::NavigationError;
pub use matcher::{MatchOutcome, ProximityMatcher, RouteProgress};
pub use polyline::{decode_polyline, decode_polyline6, encode_polyline, encode_polyline6};
pub use presenter::{MapSurface, PresentOutcome, RoutePresenter, RouteStyle};
pub use session::{NavigationSession, SessionState};
pub use tracker::{
    LocationProvider, LocationRequest, LocationSource, NavigationTracker, PositionStream,
    StopReason, TrackerEvent,
};
pub use weather::{
    CacheStore, FileStore, MemoryStore, WeatherCache, WeatherCondition, WeatherConfig, WeatherReport,
};

#[cfg(feature = "http")]
pub use http::{RoutingClient, WalkingRoute, WeatherClient};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RouteProgressRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate in degrees.
///
/// # Example
/// ```
/// use route_progress::Coordinate;
/// let museum = Coordinate::new(41.1297, 14.7697); // Benevento
/// assert!(museum.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the coordinate is finite and inside the lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// True for exactly (0, 0), what location services report before a fix.
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.longitude, y: c.latitude }
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Coordinate::new(c.y, c.x)
    }
}

/// Bounding box of a route, for fitting the map camera.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        geo_utils::compute_bounds(points)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// A location fix delivered by the host platform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Horizontal accuracy in meters, when the provider reports one
    pub accuracy_meters: Option<f64>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, timestamp_ms: i64) -> Self {
        Self { coordinate, timestamp_ms, accuracy_meters: None }
    }
}

/// Configuration for route tracking.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct NavigationConfig {
    /// Radius within which a route point counts as reached.
    /// Default: 20.0 meters
    pub proximity_threshold_meters: f64,

    /// Minimum time between two route redraws.
    /// Default: 2000 ms
    pub redraw_interval_ms: i64,

    /// Layer/source names and paint of the drawn route.
    pub route_style: RouteStyle,

    /// Location updates requested while navigating.
    /// Default: GPS every 3 s / 8 m, network every 5 s / 15 m
    pub location_requests: Vec<LocationRequest>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_meters: matcher::DEFAULT_PROXIMITY_THRESHOLD_METERS,
            redraw_interval_ms: presenter::DEFAULT_REDRAW_INTERVAL_MS,
            route_style: RouteStyle::default(),
            location_requests: vec![
                LocationRequest {
                    source: LocationSource::Gps,
                    interval_ms: 3_000,
                    min_distance_meters: 8.0,
                },
                LocationRequest {
                    source: LocationSource::Network,
                    interval_ms: 5_000,
                    min_distance_meters: 15.0,
                },
            ],
        }
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info, warn};
    use std::sync::Arc;

    fn flatten(points: &[Coordinate]) -> Vec<f64> {
        points.iter().flat_map(|p| [p.latitude, p.longitude]).collect()
    }

    fn unflatten(coords: &[f64]) -> Vec<Coordinate> {
        coords
            .chunks_exact(2)
            .map(|chunk| Coordinate::new(chunk[0], chunk[1]))
            .collect()
    }

    // ========================================================================
    // Callback Interfaces (implemented in Kotlin/Swift)
    // ========================================================================

    /// Map surface implemented by the host.
    ///
    /// Implementations must run the map work on the UI thread. Coordinates
    /// arrive as a flat array [lat1, lng1, lat2, lng2, ...]. Return false if
    /// the style could not be updated.
    #[uniffi::export(callback_interface)]
    pub trait MapSurfaceCallback: Send + Sync {
        fn show_route(&self, style: RouteStyle, coords: Vec<f64>) -> bool;
        fn clear_route(&self, style: RouteStyle) -> bool;
    }

    /// Location service implemented by the host.
    #[uniffi::export(callback_interface)]
    pub trait LocationProviderCallback: Send + Sync {
        /// Return false if updates could not be registered (e.g. no permission).
        fn request_updates(&self, requests: Vec<LocationRequest>) -> bool;
        fn remove_updates(&self);
    }

    struct CallbackSurface(Box<dyn MapSurfaceCallback>);

    impl MapSurface for CallbackSurface {
        fn show_route(&self, style: &RouteStyle, geometry: &geo::LineString<f64>) -> Result<(), NavigationError> {
            let coords: Vec<f64> = geometry.0.iter().flat_map(|c| [c.y, c.x]).collect();
            if self.0.show_route(style.clone(), coords) {
                Ok(())
            } else {
                Err(NavigationError::Render(format!("host could not show {}", style.layer_id)))
            }
        }

        fn clear_route(&self, style: &RouteStyle) -> Result<(), NavigationError> {
            if self.0.clear_route(style.clone()) {
                Ok(())
            } else {
                Err(NavigationError::Render(format!("host could not clear {}", style.layer_id)))
            }
        }
    }

    struct CallbackLocation(Box<dyn LocationProviderCallback>);

    impl LocationProvider for CallbackLocation {
        fn request_updates(&self, requests: &[LocationRequest]) -> Result<(), NavigationError> {
            if self.0.request_updates(requests.to_vec()) {
                Ok(())
            } else {
                Err(NavigationError::Location("host refused location updates".to_string()))
            }
        }

        fn remove_updates(&self) {
            self.0.remove_updates();
        }
    }

    // ========================================================================
    // Navigation Handle
    // ========================================================================

    /// One navigation screen's tracker, owned by the host.
    #[derive(uniffi::Object)]
    pub struct NavigationHandle {
        tracker: NavigationTracker<CallbackSurface>,
    }

    #[uniffi::export]
    impl NavigationHandle {
        /// Tracker without a location provider; the host pushes fixes itself.
        #[uniffi::constructor]
        pub fn new(config: NavigationConfig, surface: Box<dyn MapSurfaceCallback>) -> Arc<Self> {
            init_logging();
            info!("[RouteProgressRust] NavigationHandle created");
            Arc::new(Self {
                tracker: NavigationTracker::new(CallbackSurface(surface), config),
            })
        }

        /// Tracker that registers location updates for each session.
        #[uniffi::constructor]
        pub fn with_location(
            config: NavigationConfig,
            surface: Box<dyn MapSurfaceCallback>,
            location: Box<dyn LocationProviderCallback>,
        ) -> Arc<Self> {
            init_logging();
            info!("[RouteProgressRust] NavigationHandle created with location provider");
            Arc::new(Self {
                tracker: NavigationTracker::new(CallbackSurface(surface), config)
                    .with_location_provider(Box::new(CallbackLocation(location))),
            })
        }

        /// Start navigating an OSRM polyline6 geometry. Returns the session id.
        pub fn start_polyline(&self, encoded: String) -> Result<u64, NavigationError> {
            self.tracker.start_polyline(&encoded)
        }

        /// Start navigating a flat [lat, lng, ...] route. Returns the session id.
        pub fn start_route(&self, coords: Vec<f64>) -> Result<u64, NavigationError> {
            self.tracker.start(unflatten(&coords))
        }

        pub fn on_location(&self, latitude: f64, longitude: f64, timestamp_ms: i64) -> TrackerEvent {
            let event = self
                .tracker
                .on_position(PositionSample::new(Coordinate::new(latitude, longitude), timestamp_ms));
            debug!("[RouteProgressRust] on_location -> {:?}", event);
            event
        }

        pub fn redraw(&self) -> Result<PresentOutcome, NavigationError> {
            self.tracker.redraw()
        }

        /// Report a map update that failed after `show_route` returned.
        pub fn report_render_failure(&self, session_id: u64) -> bool {
            warn!("[RouteProgressRust] Host reported render failure for #{}", session_id);
            self.tracker.report_render_failure(session_id)
        }

        pub fn stop(&self) -> Result<(), NavigationError> {
            self.tracker.stop()
        }

        pub fn state(&self) -> SessionState {
            self.tracker.state()
        }

        /// Remaining route as [lat1, lng1, lat2, lng2, ...]
        pub fn remaining_route(&self) -> Vec<f64> {
            flatten(&self.tracker.remaining_route())
        }

        /// Bounds of the remaining route, for fitting the camera.
        pub fn remaining_bounds(&self) -> Option<Bounds> {
            Bounds::from_points(&self.tracker.remaining_route())
        }
    }

    // ========================================================================
    // Stateless Helpers
    // ========================================================================

    /// Decode a polyline6 string to [lat1, lng1, lat2, lng2, ...].
    #[uniffi::export]
    pub fn ffi_decode_polyline6(encoded: String) -> Vec<f64> {
        init_logging();
        let coords = crate::decode_polyline6(&encoded);
        debug!("[RouteProgressRust] Decoded {} points", coords.len());
        flatten(&coords)
    }

    /// Encode [lat1, lng1, lat2, lng2, ...] as a polyline6 string.
    #[uniffi::export]
    pub fn ffi_encode_polyline6(coords: Vec<f64>) -> String {
        crate::encode_polyline6(&unflatten(&coords))
    }

    #[uniffi::export]
    pub fn ffi_haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
        geo_utils::haversine_distance(&a, &b)
    }

    #[uniffi::export]
    pub fn ffi_find_progress(route: Vec<Coordinate>, position: Coordinate, threshold_meters: f64) -> MatchOutcome {
        ProximityMatcher::new(threshold_meters).find_progress(&route, &position)
    }

    /// Get default configuration.
    #[uniffi::export]
    pub fn default_navigation_config() -> NavigationConfig {
        init_logging();
        NavigationConfig::default()
    }

    // ========================================================================
    // HTTP (requires "http" feature)
    // ========================================================================

    /// Walking route returned to the host.
    #[cfg(feature = "http")]
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiWalkingRoute {
        /// Encoded polyline6 geometry, ready for `start_polyline`
        pub geometry: String,
        /// Decoded route as [lat1, lng1, lat2, lng2, ...]
        pub coords: Vec<f64>,
        pub distance_meters: f64,
        pub duration_seconds: f64,
    }

    /// Ask the routing service for a walking route between two points.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn fetch_walking_route(
        base_url: String,
        bearer_token: Option<String>,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<FfiWalkingRoute, NavigationError> {
        init_logging();
        info!("[RouteProgressRust] fetch_walking_route {:?} -> {:?}", origin, destination);

        let route = crate::http::fetch_walking_route_sync(base_url, bearer_token, origin, destination)?;
        Ok(FfiWalkingRoute {
            coords: flatten(&route.coordinates),
            geometry: route.geometry,
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
        })
    }

    /// Current weather at a position. Never cached.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn fetch_weather(
        latitude: f64,
        longitude: f64,
        location_name: String,
    ) -> Result<WeatherReport, NavigationError> {
        init_logging();
        crate::http::fetch_weather_sync(Coordinate::new(latitude, longitude), location_name)
    }

    /// Weather for the default location, served from a file cache in
    /// `cache_dir` while it is younger than the cache TTL.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn fetch_default_weather(cache_dir: String) -> Result<WeatherReport, NavigationError> {
        init_logging();
        crate::http::fetch_default_weather_sync(std::path::PathBuf::from(cache_dir))
    }
}

// ============================================================================
// Tests
// ============================================================================
