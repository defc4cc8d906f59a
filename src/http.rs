//! HTTP clients for the walking-route and weather services.
//!
//! Both clients share one request loop:
//! - Connection pooling through a single reqwest `Client`
//! - Automatic retry with exponential backoff on 429 and transport errors
//! - Timing and size logged per request

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::NavigationError;
use crate::polyline::decode_polyline6;
use crate::weather::{CacheStore, FileStore, OpenMeteoResponse, WeatherCache, WeatherConfig, WeatherReport};
use crate::Coordinate;

pub const DEFAULT_ROUTING_BASE_URL: &str = "https://muses.services.ding.unisannio.it/";

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 30;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code,surface_pressure";

fn build_client() -> Result<Client, NavigationError> {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| NavigationError::Http(format!("Failed to create HTTP client: {}", e)))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn backoff_429(retries: u32) -> Duration {
    // 500ms, 1s, 2s, 4s max
    Duration::from_millis(500 * (1 << retries.min(3)))
}

fn backoff_error(retries: u32) -> Duration {
    Duration::from_millis(200 * (1 << retries.min(4)))
}

/// Send the request built by `make_request`, retrying rate limits and
/// transport failures, and return the body of the first successful response.
async fn get_with_retry<F>(label: &str, make_request: F) -> Result<Vec<u8>, NavigationError>
where
    F: Fn() -> RequestBuilder,
{
    let mut retries = 0;
    let req_start = Instant::now();

    loop {
        match make_request().send().await {
            Ok(resp) => {
                let status = resp.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(NavigationError::Http("Max retries exceeded (429)".to_string()));
                    }
                    let wait = backoff_429(retries);
                    warn!("[{}] 429 Too Many Requests, retry {} with {:?} backoff", label, retries, wait);
                    tokio::time::sleep(wait).await;
                    continue;
                }

                if !status.is_success() {
                    return Err(NavigationError::Http(format!("HTTP {}", status)));
                }

                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| NavigationError::Http(format!("Body download error: {}", e)))?;

                info!(
                    "[{}] {} in {:?} ({:.1}KB)",
                    label,
                    status,
                    req_start.elapsed(),
                    bytes.len() as f64 / 1024.0
                );
                return Ok(bytes.to_vec());
            }
            Err(e) => {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(NavigationError::Http(format!("Request error: {}", e)));
                }
                let wait = backoff_error(retries);
                warn!("[{}] Error: {}, retry {} after {:?}", label, e, retries, wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

// ============================================================================
// Routing
// ============================================================================

/// Only the fields the tracker needs; waypoints and weights are ignored.
#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: String,
    distance: f64,
    duration: f64,
}

/// A walking route ready to hand to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkingRoute {
    /// Encoded polyline6 geometry
    pub geometry: String,
    pub coordinates: Vec<Coordinate>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

fn parse_route_response(body: &[u8]) -> Result<WalkingRoute, NavigationError> {
    let data: OsrmResponse = serde_json::from_slice(body)
        .map_err(|e| NavigationError::Http(format!("JSON parse error: {}", e)))?;

    if data.code != "Ok" {
        debug!("[RoutingClient] Service answered code {}", data.code);
        return Err(NavigationError::NoRoute);
    }
    let route = data.routes.into_iter().next().ok_or(NavigationError::NoRoute)?;

    let coordinates = decode_polyline6(&route.geometry);
    if coordinates.is_empty() {
        return Err(NavigationError::EmptyPolyline);
    }

    Ok(WalkingRoute {
        geometry: route.geometry,
        coordinates,
        distance_meters: route.distance,
        duration_seconds: route.duration,
    })
}

/// Client for the OSRM-compatible walking route endpoint.
pub struct RoutingClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RoutingClient {
    pub fn new(base_url: &str, bearer_token: Option<String>) -> Result<Self, NavigationError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.to_string(),
            bearer_token,
        })
    }

    /// Path and query for a route between two points. OSRM wants lng,lat.
    pub fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        join_url(
            &self.base_url,
            &format!(
                "osrm/route/v1/walking/{},{};{},{}?geometries=polyline6",
                origin.longitude, origin.latitude, destination.longitude, destination.latitude
            ),
        )
    }

    pub async fn walking_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<WalkingRoute, NavigationError> {
        let url = self.route_url(origin, destination);
        debug!("[RoutingClient] GET {}", url);

        let body = get_with_retry("RoutingClient", || {
            let request = self.client.get(&url);
            match &self.bearer_token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        })
        .await?;

        let route = parse_route_response(&body)?;
        info!(
            "[RoutingClient] Route with {} points, {:.0}m, {:.0}s",
            route.coordinates.len(),
            route.distance_meters,
            route.duration_seconds
        );
        Ok(route)
    }
}

// ============================================================================
// Weather
// ============================================================================

fn unix_seconds_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Client for the Open-Meteo `forecast` endpoint.
pub struct WeatherClient {
    client: Client,
    config: WeatherConfig,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Result<Self, NavigationError> {
        Ok(Self { client: build_client()?, config })
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    pub fn forecast_url(&self) -> String {
        join_url(&self.config.base_url, "forecast")
    }

    /// Current conditions at `location`. Always hits the network.
    pub async fn current_weather(
        &self,
        location: Coordinate,
        location_name: &str,
    ) -> Result<WeatherReport, NavigationError> {
        let url = self.forecast_url();
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();

        let body = get_with_retry("WeatherClient", || {
            self.client.get(&url).query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
                ("hourly", "visibility"),
                ("timezone", self.config.timezone.as_str()),
            ])
        })
        .await?;

        let data: OpenMeteoResponse = serde_json::from_slice(&body)
            .map_err(|e| NavigationError::Http(format!("JSON parse error: {}", e)))?;
        Ok(WeatherReport::from_open_meteo(&data, location_name, unix_seconds_now()))
    }

    /// Weather for the configured default location, served from `cache`
    /// while fresh. A failure to save the new report is only logged.
    pub async fn default_location_weather<S: CacheStore, C: Clock>(
        &self,
        cache: &WeatherCache<S, C>,
    ) -> Result<WeatherReport, NavigationError> {
        if let Some(report) = cache.get() {
            info!("[WeatherClient] Using cached weather for {}", report.location_name);
            return Ok(report);
        }

        let report = self
            .current_weather(self.config.default_location, &self.config.default_location_name)
            .await?;
        if let Err(e) = cache.put(&report) {
            warn!("[WeatherClient] Could not cache weather: {}", e);
        }
        Ok(report)
    }
}

// ============================================================================
// Blocking wrappers
// ============================================================================

fn runtime() -> Result<tokio::runtime::Runtime, NavigationError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| {
            warn!("Failed to create tokio runtime: {}", e);
            NavigationError::Http(format!("Runtime error: {}", e))
        })
}

/// Synchronous wrapper for FFI - runs the request on a fresh tokio runtime
pub fn fetch_walking_route_sync(
    base_url: String,
    bearer_token: Option<String>,
    origin: Coordinate,
    destination: Coordinate,
) -> Result<WalkingRoute, NavigationError> {
    let rt = runtime()?;
    let client = RoutingClient::new(&base_url, bearer_token)?;
    rt.block_on(client.walking_route(origin, destination))
}

pub fn fetch_weather_sync(location: Coordinate, location_name: String) -> Result<WeatherReport, NavigationError> {
    let rt = runtime()?;
    let client = WeatherClient::new(WeatherConfig::default())?;
    rt.block_on(client.current_weather(location, &location_name))
}

/// Default-location weather cached in `cache_dir`.
pub fn fetch_default_weather_sync(cache_dir: PathBuf) -> Result<WeatherReport, NavigationError> {
    let config = WeatherConfig::default();
    let cache = WeatherCache::with_clock(FileStore::in_dir(cache_dir), crate::clock::SystemClock, config.cache_ttl_ms);
    if let Some(report) = cache.get() {
        return Ok(report);
    }

    let rt = runtime()?;
    let client = WeatherClient::new(config)?;
    rt.block_on(client.default_location_weather(&cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::weather::MemoryStore;

    const OSRM_OK: &str = r#"{
        "code": "Ok",
        "routes": [{
            "geometry": "_izlhA~rlgdF_{geC~ywl@_kwzCn`{nI",
            "legs": [{"steps": [], "summary": "", "weight": 312.4, "duration": 312.4, "distance": 433.9}],
            "weight_name": "duration",
            "weight": 312.4,
            "duration": 312.4,
            "distance": 433.9
        }],
        "waypoints": [
            {"hint": "abc", "location": [14.7697, 41.1297], "name": "Corso Garibaldi", "distance": 2.1},
            {"hint": "def", "location": [14.7744, 41.1318], "name": "", "distance": 0.4}
        ]
    }"#;

    #[test]
    fn test_route_url() {
        let client = RoutingClient::new(DEFAULT_ROUTING_BASE_URL, None).unwrap();
        let url = client.route_url(Coordinate::new(41.1297, 14.7697), Coordinate::new(41.1318, 14.7744));
        assert_eq!(
            url,
            "https://muses.services.ding.unisannio.it/osrm/route/v1/walking/14.7697,41.1297;14.7744,41.1318?geometries=polyline6"
        );
    }

    #[test]
    fn test_join_url_slashes() {
        assert_eq!(join_url("https://a.b/v1/", "forecast"), "https://a.b/v1/forecast");
        assert_eq!(join_url("https://a.b/v1", "/forecast"), "https://a.b/v1/forecast");
    }

    #[test]
    fn test_parse_route_response() {
        let route = parse_route_response(OSRM_OK.as_bytes()).unwrap();
        assert_eq!(route.coordinates.len(), 3);
        assert!((route.coordinates[0].latitude - 38.5).abs() < 1e-6);
        assert!((route.coordinates[0].longitude + 120.2).abs() < 1e-6);
        assert_eq!(route.distance_meters, 433.9);
        assert_eq!(route.duration_seconds, 312.4);
    }

    #[test]
    fn test_parse_route_without_routes() {
        let body = br#"{"code": "NoRoute", "routes": [], "waypoints": []}"#;
        assert_eq!(parse_route_response(body), Err(NavigationError::NoRoute));

        let body = br#"{"code": "Ok", "routes": []}"#;
        assert_eq!(parse_route_response(body), Err(NavigationError::NoRoute));
    }

    #[test]
    fn test_parse_route_ignores_waypoint_shape() {
        let body = br#"{"code": "Ok", "waypoints": "unexpected",
            "routes": [{"geometry": "_izlhA~rlgdF", "distance": 1.0, "duration": 2.0, "weight": "n/a"}]}"#;
        let route = parse_route_response(body).unwrap();
        assert_eq!(route.coordinates.len(), 1);
        assert_eq!(route.duration_seconds, 2.0);
    }

    #[test]
    fn test_parse_route_bad_json() {
        assert!(matches!(parse_route_response(b"<html>"), Err(NavigationError::Http(_))));
    }

    #[test]
    fn test_backoff_growth() {
        assert_eq!(backoff_429(1), Duration::from_millis(1_000));
        assert_eq!(backoff_429(9), Duration::from_millis(4_000));
        assert_eq!(backoff_error(1), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_default_weather_served_from_cache() {
        let clock = ManualClock::new(1_000);
        let cache = WeatherCache::with_clock(MemoryStore::new(), clock, 60_000);
        let report = WeatherReport {
            location_name: "Benevento, Italy".to_string(),
            temperature_c: 21.0,
            feels_like_c: 21.5,
            humidity_percent: 65,
            pressure_hpa: 1013,
            wind_speed_kmh: 7.0,
            visibility_meters: 10_000,
            condition: crate::weather::WeatherCondition {
                code: 0,
                main: "Clear".to_string(),
                description: "clear sky".to_string(),
                icon: "01d".to_string(),
            },
            observed_at: 0,
        };
        cache.put(&report).unwrap();

        // Unroutable base URL: a cache hit must not touch the network
        let client = WeatherClient::new(WeatherConfig {
            base_url: "http://127.0.0.1:1/v1/".to_string(),
            ..WeatherConfig::default()
        })
        .unwrap();
        assert_eq!(client.default_location_weather(&cache).await, Ok(report));
    }
}
