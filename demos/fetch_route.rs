//! Fetch a walking route and the current weather, then start tracking.
//!
//! Run with: cargo run --example fetch_route --features http
//!
//! Set ROUTING_TOKEN to send a bearer token to the routing service.

use geo::LineString;
use route_progress::http::DEFAULT_ROUTING_BASE_URL;
use route_progress::{
    Coordinate, MapSurface, NavigationConfig, NavigationError, NavigationTracker, RouteStyle,
    RoutingClient, WeatherClient, WeatherConfig,
};

struct ConsoleMap;

impl MapSurface for ConsoleMap {
    fn show_route(&self, style: &RouteStyle, geometry: &LineString<f64>) -> Result<(), NavigationError> {
        println!("[map] {} <- {} points", style.layer_id, geometry.0.len());
        Ok(())
    }

    fn clear_route(&self, _style: &RouteStyle) -> Result<(), NavigationError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), NavigationError> {
    env_logger::init();

    let origin = Coordinate::new(41.1297, 14.7697);
    let destination = Coordinate::new(41.1318, 14.7744);

    let weather = WeatherClient::new(WeatherConfig::default())?;
    match weather.current_weather(origin, "Benevento").await {
        Ok(report) => println!(
            "Weather: {} ({}), {:.1}°C, visibility {}m",
            report.condition.main, report.condition.description, report.temperature_c, report.visibility_meters
        ),
        Err(e) => println!("Weather unavailable: {}", e),
    }

    let routing = RoutingClient::new(DEFAULT_ROUTING_BASE_URL, std::env::var("ROUTING_TOKEN").ok())?;
    let route = routing.walking_route(origin, destination).await?;
    println!(
        "Route: {} points, {:.0}m, about {:.0} min",
        route.coordinates.len(),
        route.distance_meters,
        route.duration_seconds / 60.0
    );

    let tracker = NavigationTracker::new(ConsoleMap, NavigationConfig::default());
    let session_id = tracker.start_polyline(&route.geometry)?;
    println!("Tracking session #{}", session_id);
    tracker.stop()
}
