// src/config/mod.rs
//! Process configuration: one JSON file describing this station's feed login,
//! the dedupe windows and the watch targets ("beacons").
//!
//! Loaded and validated once at startup; a failure here is fatal.

pub mod target;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

use crate::geo::LatLon;
use crate::notify::Credentials;

pub use target::WatchTarget;
use target::{clean_identifiers, ordered_beacons, RawBeacon};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const ENV_CONFIG_PATH: &str = "BEACON_CONFIG_PATH";

pub const DEFAULT_APRS_SERVER: &str = "rotate.aprs2.net:10152";

fn default_hash_precision() -> usize {
    3
}
fn default_nearby_dedupe_minutes() -> u64 {
    60
}
fn default_includes_dedupe_minutes() -> u64 {
    240
}
fn default_license_cache_days() -> u64 {
    14
}
fn default_pushover_priority() -> i8 {
    1
}
fn default_aprs_server() -> String {
    DEFAULT_APRS_SERVER.to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("myCall must not be empty")]
    MissingCall,

    #[error("hashPrecision must be within 1..=12, got {0}")]
    Precision(usize),

    #[error("no beacons configured")]
    NoBeacons,

    #[error("beacon label {0:?} is used more than once")]
    DuplicateLabel(String),

    #[error("beacon {label:?}: location {lat},{lon} is out of range")]
    InvalidLocation { label: String, lat: f64, lon: f64 },

    #[error("beacon {label:?}: reportCloserThanDistanceMiles must be positive, got {value}")]
    InvalidThreshold { label: String, value: f64 },

    #[error("beacon {0:?}: pushoverUser and pushoverToken are required")]
    MissingCredentials(String),

    #[error("beacon {label:?}: unknown time zone {zone:?}")]
    UnknownTimezone { label: String, zone: String },

    #[error("{field} = {value} is too large")]
    DurationOutOfRange { field: &'static str, value: u64 },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    my_call: String,
    #[serde(default = "default_hash_precision")]
    hash_precision: usize,
    #[serde(default = "default_nearby_dedupe_minutes")]
    nearby_dedupe_minutes: u64,
    #[serde(default = "default_includes_dedupe_minutes")]
    includes_dedupe_minutes: u64,
    #[serde(default = "default_license_cache_days")]
    license_cache_days: u64,
    #[serde(default = "default_pushover_priority")]
    pushover_priority: i8,
    #[serde(default = "default_aprs_server")]
    aprs_server: String,
    #[serde(default)]
    aprs_filter: Option<String>,
    #[serde(deserialize_with = "ordered_beacons")]
    beacons: Vec<(String, RawBeacon)>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Login used on the APRS-IS feed.
    pub my_call: String,
    /// Geohash length used for the spatial buckets.
    pub hash_precision: usize,
    pub nearby_dedupe: Duration,
    pub includes_dedupe: Duration,
    pub license_ttl: Duration,
    pub pushover_priority: i8,
    pub aprs_server: String,
    pub aprs_filter: Option<String>,
    /// Watch targets in configuration order.
    pub targets: Vec<Arc<WatchTarget>>,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// `$BEACON_CONFIG_PATH` when set, `config.json` otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_file(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(s)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let my_call = raw.my_call.trim().to_ascii_uppercase();
        if my_call.is_empty() {
            return Err(ConfigError::MissingCall);
        }
        if !(1..=12).contains(&raw.hash_precision) {
            return Err(ConfigError::Precision(raw.hash_precision));
        }
        if raw.beacons.is_empty() {
            return Err(ConfigError::NoBeacons);
        }

        let mut targets: Vec<Arc<WatchTarget>> = Vec::with_capacity(raw.beacons.len());
        for (label, b) in raw.beacons {
            if targets.iter().any(|t| t.label == label) {
                return Err(ConfigError::DuplicateLabel(label));
            }
            targets.push(Arc::new(build_target(label, b)?));
        }

        let aprs_filter = raw
            .aprs_filter
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        Ok(Self {
            my_call,
            hash_precision: raw.hash_precision,
            nearby_dedupe: scaled_secs("nearbyDedupeMinutes", raw.nearby_dedupe_minutes, 60)?,
            includes_dedupe: scaled_secs(
                "includesDedupeMinutes",
                raw.includes_dedupe_minutes,
                60,
            )?,
            license_ttl: scaled_secs("licenseCacheDays", raw.license_cache_days, 86_400)?,
            pushover_priority: raw.pushover_priority.clamp(-2, 2),
            aprs_server: raw.aprs_server.trim().to_string(),
            aprs_filter,
            targets,
        })
    }
}

/// `value * unit` seconds, rejecting values that overflow.
fn scaled_secs(field: &'static str, value: u64, unit: u64) -> Result<Duration, ConfigError> {
    value
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or(ConfigError::DurationOutOfRange { field, value })
}

fn build_target(label: String, b: RawBeacon) -> Result<WatchTarget, ConfigError> {
    let in_range = b.my_lat.is_finite()
        && b.my_long.is_finite()
        && (-90.0..=90.0).contains(&b.my_lat)
        && (-180.0..=180.0).contains(&b.my_long);
    if !in_range {
        return Err(ConfigError::InvalidLocation {
            label,
            lat: b.my_lat,
            lon: b.my_long,
        });
    }

    let threshold = b.report_closer_than_distance_miles;
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(ConfigError::InvalidThreshold {
            label,
            value: threshold,
        });
    }

    let user = b.pushover_user.trim().to_string();
    let token = b.pushover_token.trim().to_string();
    if user.is_empty() || token.is_empty() {
        return Err(ConfigError::MissingCredentials(label));
    }

    let timezone = match b.timezone.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(zone) => Some(zone.parse::<Tz>().map_err(|_| ConfigError::UnknownTimezone {
            label: label.clone(),
            zone: zone.to_string(),
        })?),
    };

    Ok(WatchTarget {
        label,
        home: LatLon::new(b.my_lat, b.my_long),
        threshold_miles: threshold,
        exclude: clean_identifiers(b.exclude).into_iter().collect(),
        include: clean_identifiers(b.include),
        credentials: Credentials { user, token },
        timezone,
    })
}
