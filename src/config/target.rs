// src/config/target.rs
use std::collections::HashSet;
use std::fmt;

use chrono_tz::Tz;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::geo::LatLon;
use crate::notify::Credentials;

/// A configured location that wants alerts about nearby or listed stations.
/// Immutable after load; shared by both indexes through `Arc`.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    /// Unique label; shown in parentheses in every alert.
    pub label: String,
    pub home: LatLon,
    /// Strict upper bound (miles) for proximity alerts.
    pub threshold_miles: f64,
    /// Source identifiers (`CALL` or `CALL-SSID`) never alerted on by proximity.
    pub exclude: HashSet<String>,
    /// Source identifiers alerted on regardless of location.
    pub include: Vec<String>,
    pub credentials: Credentials,
    pub timezone: Option<Tz>,
}

impl WatchTarget {
    pub fn excludes(&self, source: &str) -> bool {
        self.exclude.contains(source)
    }

    /// Zone used for alert timestamps; UTC when unset.
    pub fn tz(&self) -> Tz {
        self.timezone.unwrap_or(Tz::UTC)
    }
}

/// One entry of the `beacons` map as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBeacon {
    pub my_lat: f64,
    pub my_long: f64,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    pub report_closer_than_distance_miles: f64,
    pub pushover_user: String,
    #[serde(alias = "pushoverTokenUser")]
    pub pushover_token: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Deserialize a `label -> beacon` map into a list that keeps document order.
pub(crate) fn ordered_beacons<'de, D>(de: D) -> Result<Vec<(String, RawBeacon)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedBeacons;

    impl<'de> Visitor<'de> for OrderedBeacons {
        type Value = Vec<(String, RawBeacon)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of beacon label to beacon settings")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((label, beacon)) = map.next_entry::<String, RawBeacon>()? {
                out.push((label, beacon));
            }
            Ok(out)
        }
    }

    de.deserialize_map(OrderedBeacons)
}

/// Trim + uppercase, drop empties, keep first occurrence order.
pub(crate) fn clean_identifiers(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_ascii_uppercase();
        if !t.is_empty() && seen.insert(t.clone()) {
            out.push(t);
        }
    }
    out
}
