//! # Weather Reports and Cache
//!
//! Current-conditions reports built from Open-Meteo responses, and a small
//! time-limited cache so the default location is fetched at most once per
//! hour.
//!
//! The cache stores the serialized report and its write time in a
//! [`CacheStore`], a string key/value store. [`MemoryStore`] keeps entries in
//! process, [`FileStore`] persists them to a single JSON file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::NavigationError;
use crate::Coordinate;

/// Reports younger than this are served from the cache.
pub const DEFAULT_WEATHER_TTL_MS: i64 = 60 * 60 * 1000;

/// Visibility reported when the forecast has no hourly data.
pub const DEFAULT_VISIBILITY_METERS: i32 = 10_000;

const KEY_CACHED_DATA: &str = "cached_weather_data";
const KEY_LAST_UPDATE: &str = "last_update";

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct WeatherCondition {
    /// WMO weather interpretation code
    pub code: i32,
    /// Short group name, e.g. "Rain"
    pub main: String,
    pub description: String,
    /// Icon id in the familiar "01d" style
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct WeatherReport {
    pub location_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_percent: i32,
    pub pressure_hpa: i32,
    /// Wind speed at 10 m in km/h
    pub wind_speed_kmh: f64,
    pub visibility_meters: i32,
    pub condition: WeatherCondition,
    /// Unix seconds
    pub observed_at: i64,
}

/// Map a WMO weather code to (main, description, icon).
pub fn describe_weather_code(code: i32) -> (&'static str, &'static str, &'static str) {
    match code {
        0 => ("Clear", "clear sky", "01d"),
        1..=3 => ("Clouds", "partly cloudy", "02d"),
        45 | 48 => ("Fog", "fog", "50d"),
        51 | 53 | 55 => ("Drizzle", "drizzle", "10d"),
        61 | 63 | 65 => ("Rain", "rain", "10d"),
        71 | 73 | 75 => ("Snow", "snow", "13d"),
        77 => ("Snow", "snow grains", "13d"),
        80..=82 => ("Rain", "rain showers", "10d"),
        85 | 86 => ("Snow", "snow showers", "13d"),
        95 => ("Thunderstorm", "thunderstorm", "11d"),
        96 | 99 => ("Thunderstorm", "thunderstorm with hail", "11d"),
        _ => ("Clear", "variable conditions", "01d"),
    }
}

/// `forecast` response with the `current` and `hourly=visibility` fields requested.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenMeteoResponse {
    pub current: OpenMeteoCurrent,
    #[serde(default)]
    pub hourly: Option<OpenMeteoHourly>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenMeteoCurrent {
    #[serde(rename = "temperature_2m")]
    pub temperature: f64,
    #[serde(rename = "relative_humidity_2m")]
    pub humidity: f64,
    #[serde(rename = "wind_speed_10m")]
    pub wind_speed: f64,
    pub weather_code: i32,
    pub surface_pressure: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenMeteoHourly {
    #[serde(default)]
    pub visibility: Option<Vec<Option<f64>>>,
}

impl WeatherReport {
    /// Build a report from a forecast response.
    ///
    /// Feels-like is approximated as `temp + (humidity - 60) * 0.1`.
    /// Visibility is the first hourly value, in meters.
    pub fn from_open_meteo(response: &OpenMeteoResponse, location_name: &str, observed_at: i64) -> Self {
        let current = &response.current;
        let (main, description, icon) = describe_weather_code(current.weather_code);
        let humidity = current.humidity.round() as i32;

        let visibility_meters = response
            .hourly
            .as_ref()
            .and_then(|h| h.visibility.as_ref())
            .and_then(|v| v.first().copied().flatten())
            .map(|m| m.round() as i32)
            .unwrap_or(DEFAULT_VISIBILITY_METERS);

        Self {
            location_name: location_name.to_string(),
            temperature_c: current.temperature,
            feels_like_c: current.temperature + (humidity - 60) as f64 * 0.1,
            humidity_percent: humidity,
            pressure_hpa: current.surface_pressure as i32,
            wind_speed_kmh: current.wind_speed,
            visibility_meters,
            condition: WeatherCondition {
                code: current.weather_code,
                main: main.to_string(),
                description: description.to_string(),
                icon: icon.to_string(),
            },
            observed_at,
        }
    }
}

/// Where and how weather is fetched.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct WeatherConfig {
    /// Default: "https://api.open-meteo.com/v1/"
    pub base_url: String,
    /// Location served through the cache. Default: Benevento
    pub default_location: Coordinate,
    pub default_location_name: String,
    /// Default: "Europe/Rome"
    pub timezone: String,
    /// Default: one hour
    pub cache_ttl_ms: i64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/".to_string(),
            default_location: Coordinate::new(41.1297, 14.7697),
            default_location_name: "Benevento, Italy".to_string(),
            timezone: "Europe/Rome".to_string(),
            cache_ttl_ms: DEFAULT_WEATHER_TTL_MS,
        }
    }
}

// ============================================================================
// Stores
// ============================================================================

/// String key/value persistence for the cache.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, NavigationError>;
    fn put(&self, key: &str, value: &str) -> Result<(), NavigationError>;
    fn clear(&self) -> Result<(), NavigationError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, NavigationError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), NavigationError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), NavigationError> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

/// All entries in one JSON object on disk. Writes replace the file atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Store named `weather_cache.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("weather_cache.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, NavigationError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), NavigationError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, NavigationError> {
        Ok(self.read_all()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), NavigationError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // An unreadable file is replaced rather than blocking every write
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn clear(&self) -> Result<(), NavigationError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

pub struct WeatherCache<S: CacheStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    ttl_ms: i64,
}

impl<S: CacheStore> WeatherCache<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock, DEFAULT_WEATHER_TTL_MS)
    }
}

impl<S: CacheStore, C: Clock> WeatherCache<S, C> {
    pub fn with_clock(store: S, clock: C, ttl_ms: i64) -> Self {
        Self { store, clock, ttl_ms }
    }

    /// True while the last stored report is younger than the TTL.
    pub fn is_fresh(&self) -> bool {
        let last_update = match self.store.get(KEY_LAST_UPDATE) {
            Ok(Some(value)) => value.parse::<i64>().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("[WeatherCache] Could not read cache timestamp: {}", e);
                None
            }
        };

        match last_update {
            // An age that does not fit in an i64 is a corrupt timestamp
            Some(at) => self.clock.now_ms().checked_sub(at).map_or(false, |age| age < self.ttl_ms),
            None => false,
        }
    }

    /// The cached report, if present, fresh and readable.
    pub fn get(&self) -> Option<WeatherReport> {
        if !self.is_fresh() {
            debug!("[WeatherCache] Miss: empty or expired");
            return None;
        }

        let json = match self.store.get(KEY_CACHED_DATA) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!("[WeatherCache] Could not read cached report: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(report) => {
                debug!("[WeatherCache] Hit");
                Some(report)
            }
            Err(e) => {
                error!("[WeatherCache] Error parsing cached data: {}", e);
                None
            }
        }
    }

    /// Store `report` stamped with the current time.
    pub fn put(&self, report: &WeatherReport) -> Result<(), NavigationError> {
        let json = serde_json::to_string(report)?;
        self.store.put(KEY_CACHED_DATA, &json)?;
        self.store.put(KEY_LAST_UPDATE, &self.clock.now_ms().to_string())?;
        info!("[WeatherCache] Saved report for {}", report.location_name);
        Ok(())
    }

    pub fn invalidate(&self) -> Result<(), NavigationError> {
        self.store.clear()
    }
}
