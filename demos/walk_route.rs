//! Simulated walk along a short route through Benevento.
//!
//! Run with: RUST_LOG=debug cargo run --example walk_route

use std::sync::Arc;

use geo::LineString;
use route_progress::{
    encode_polyline6, Clock, Coordinate, ManualClock, MapSurface, NavigationConfig, NavigationError,
    NavigationTracker, PositionSample, RouteStyle, TrackerEvent,
};

/// Prints each redraw instead of touching a real map.
struct ConsoleMap;

impl MapSurface for ConsoleMap {
    fn show_route(&self, style: &RouteStyle, geometry: &LineString<f64>) -> Result<(), NavigationError> {
        println!("   [map] {} <- {} points", style.layer_id, geometry.0.len());
        Ok(())
    }

    fn clear_route(&self, style: &RouteStyle) -> Result<(), NavigationError> {
        println!("   [map] removed {}", style.layer_id);
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let route: Vec<Coordinate> = (0..8)
        .map(|i| Coordinate::new(41.1297 + i as f64 * 0.0003, 14.7697 + i as f64 * 0.0002))
        .collect();
    println!("Route polyline6: {}\n", encode_polyline6(&route));

    let clock = Arc::new(ManualClock::new(0));
    let tracker = NavigationTracker::with_clock(ConsoleMap, NavigationConfig::default(), Arc::clone(&clock));

    let session_id = match tracker.start(route.clone()) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Could not start: {}", e);
            return;
        }
    };
    println!("Session #{} started\n", session_id);

    // One fix per second, walking point to point with a little noise
    for (step, point) in route.iter().enumerate().skip(1) {
        clock.advance(1_000);
        let fix = Coordinate::new(point.latitude + 0.00002, point.longitude - 0.00001);
        let event = tracker.on_position(PositionSample::new(fix, clock.now_ms()));

        match event {
            TrackerEvent::Advanced { remaining_points, remaining_meters, redrawn } => println!(
                "t={}s: {} points / {:.0}m left{}",
                step,
                remaining_points,
                remaining_meters,
                if redrawn { "" } else { " (throttled)" }
            ),
            TrackerEvent::DestinationReached => {
                println!("t={}s destination reached", step);
                break;
            }
            other => println!("t={}s {:?}", step, other),
        }
    }

    println!("\nFinal state: {:?}", tracker.state());
}
