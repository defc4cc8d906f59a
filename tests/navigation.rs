//! End-to-end walk through the public API: decode a route, track a walk
//! along it, and check what the map was asked to draw.

use std::sync::{Arc, Mutex};

use geo::LineString;
use route_progress::{
    decode_polyline6, encode_polyline6, geo_utils::haversine_distance, Clock, Coordinate,
    LocationProvider, LocationRequest, ManualClock, MapSurface, NavigationConfig,
    NavigationError, NavigationTracker, PositionSample, RouteStyle, SessionState, TrackerEvent,
};

#[derive(Default)]
struct MapLog {
    draws: Mutex<Vec<usize>>,
    clears: Mutex<u32>,
}

impl MapSurface for MapLog {
    fn show_route(&self, _style: &RouteStyle, geometry: &LineString<f64>) -> Result<(), NavigationError> {
        self.draws.lock().unwrap().push(geometry.0.len());
        Ok(())
    }

    fn clear_route(&self, _style: &RouteStyle) -> Result<(), NavigationError> {
        *self.clears.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
struct DeniedLocation {
    requests: Mutex<u32>,
}

impl LocationProvider for DeniedLocation {
    fn request_updates(&self, requests: &[LocationRequest]) -> Result<(), NavigationError> {
        assert_eq!(requests.len(), 2);
        *self.requests.lock().unwrap() += 1;
        Err(NavigationError::Location("permission denied".to_string()))
    }

    fn remove_updates(&self) {}
}

/// Points roughly 55 m apart heading north.
fn street() -> Vec<Coordinate> {
    (0..6).map(|i| Coordinate::new(41.1297 + i as f64 * 0.0005, 14.7697)).collect()
}

fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}

#[test]
fn walk_from_encoded_route_to_destination() {
    let encoded = encode_polyline6(&street());
    let decoded = decode_polyline6(&encoded);
    assert_eq!(decoded.len(), 6);
    assert!(approx_eq(haversine_distance(&decoded[0], &decoded[1]), 55.6, 0.5));

    let map = Arc::new(MapLog::default());
    let clock = Arc::new(ManualClock::new(0));
    let tracker = NavigationTracker::with_clock(Arc::clone(&map), NavigationConfig::default(), Arc::clone(&clock));

    tracker.start_polyline(&encoded).unwrap();
    assert_eq!(tracker.state(), SessionState::Active);
    assert_eq!(*map.draws.lock().unwrap(), vec![6]);

    // One fix on each point, spaced past the redraw throttle
    let mut events = Vec::new();
    for point in decoded.iter().skip(1) {
        clock.advance(2_500);
        events.push(tracker.on_position(PositionSample::new(*point, clock.now_ms())));
    }

    assert_eq!(events.len(), 5);
    for event in &events[..4] {
        assert!(matches!(event, TrackerEvent::Advanced { redrawn: true, .. }), "{:?}", event);
    }
    assert_eq!(events[4], TrackerEvent::DestinationReached);

    assert_eq!(tracker.state(), SessionState::Idle);
    assert_eq!(*map.draws.lock().unwrap(), vec![6, 5, 4, 3, 2]);
    // Arrival keeps the last drawing on screen
    assert_eq!(*map.clears.lock().unwrap(), 0);
}

#[test]
fn follow_stream_with_denied_location() {
    let map = Arc::new(MapLog::default());
    let location = Arc::new(DeniedLocation::default());
    let tracker = NavigationTracker::with_clock(
        Arc::clone(&map),
        NavigationConfig::default(),
        ManualClock::new(10_000),
    )
    .with_location_provider(Box::new(Arc::clone(&location)));

    // Denied permission leaves the route on screen and the session running
    tracker.start(street()).unwrap();
    assert_eq!(*location.requests.lock().unwrap(), 1);
    assert_eq!(tracker.state(), SessionState::Active);

    let walk = vec![
        PositionSample::new(Coordinate::new(0.0, 0.0), 10_100),
        PositionSample::new(street()[2], 10_200),
        PositionSample::new(street()[5], 10_300),
        PositionSample::new(street()[1], 10_400),
    ];
    assert_eq!(tracker.follow(walk.into_iter()), TrackerEvent::DestinationReached);
    assert_eq!(tracker.state(), SessionState::Idle);
}

#[test]
fn user_stop_clears_map() {
    let map = Arc::new(MapLog::default());
    let tracker = NavigationTracker::new(Arc::clone(&map), NavigationConfig::default());

    let session_id = tracker.start(street()).unwrap();
    tracker.stop().unwrap();

    assert_eq!(tracker.state(), SessionState::Idle);
    assert_eq!(*map.clears.lock().unwrap(), 1);
    assert!(!tracker.report_render_failure(session_id));
    assert_eq!(
        tracker.on_position(PositionSample::new(street()[3], 0)),
        TrackerEvent::Ignored
    );
}

#[test]
fn late_render_failure_stops_current_session() {
    let map = Arc::new(MapLog::default());
    let tracker = NavigationTracker::new(Arc::clone(&map), NavigationConfig::default());

    let first = tracker.start(street()).unwrap();
    let second = tracker.start(street()).unwrap();

    assert!(!tracker.report_render_failure(first));
    assert_eq!(tracker.state(), SessionState::Active);

    assert!(tracker.report_render_failure(second));
    assert_eq!(tracker.state(), SessionState::Idle);
}
