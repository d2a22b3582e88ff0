//! # Geo
//! Pure geographic helpers used by routing: geohash bucket keys, great-circle
//! distance and compass bearing.
//!
//! No I/O and no validation; coordinates are expected to be in range.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sphere radius used for distance, in meters (WGS-84 equatorial radius).
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Meters to statute miles.
pub const METERS_TO_MILES: f64 = 0.000621371;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lon)
    }
}

/// Encode `point` as a geohash of `precision` characters.
///
/// Two points with the same key share a cell; cell size shrinks roughly
/// 32× per extra character (precision 3 ≈ 156 km × 156 km). `None` when the
/// point is out of range or the precision is unsupported.
pub fn geohash(point: LatLon, precision: usize) -> Option<String> {
    ::geohash::encode(
        ::geohash::Coord {
            x: point.lon,
            y: point.lat,
        },
        precision,
    )
    .ok()
}

/// Great-circle distance in meters (haversine).
pub fn haversine_m(a: LatLon, b: LatLon) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial great-circle bearing from `from` toward `to`, degrees in `[0, 360)`.
pub fn initial_bearing_deg(from: LatLon, to: LatLon) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Eight-point compass rose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    const ROSE: [Compass; 8] = [
        Compass::N,
        Compass::NE,
        Compass::E,
        Compass::SE,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    /// Nearest compass point for a bearing in degrees (any range).
    pub fn from_degrees(deg: f64) -> Self {
        let normalized = deg.rem_euclid(360.0);
        let sector = ((normalized + 22.5) / 45.0).floor() as usize % 8;
        Self::ROSE[sector]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compass::N => "N",
            Compass::NE => "NE",
            Compass::E => "E",
            Compass::SE => "SE",
            Compass::S => "S",
            Compass::SW => "SW",
            Compass::W => "W",
            Compass::NW => "NW",
        }
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance and direction of a report relative to a watch target's home.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Unrounded distance; used for threshold comparisons.
    pub miles: f64,
    /// `None` when the report sits exactly on the home location.
    pub bearing: Option<Compass>,
}

impl Proximity {
    /// Distance rounded to one decimal place, for display only.
    pub fn rounded_miles(&self) -> f64 {
        (self.miles * 10.0).round() / 10.0
    }
}

/// Distance from `home` to `report` in miles, and the direction of the
/// report as seen from `home`: a report north of home reads `N`.
pub fn distance_and_bearing(report: LatLon, home: LatLon) -> Proximity {
    let meters = haversine_m(home, report);
    let bearing = if meters > 0.0 {
        Some(Compass::from_degrees(initial_bearing_deg(home, report)))
    } else {
        None
    };
    Proximity {
        miles: meters * METERS_TO_MILES,
        bearing,
    }
}
