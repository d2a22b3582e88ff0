// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::geo::LatLon;

/// One decoded packet from the feed. Transient: routed once, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Report {
    pub call: String,        // e.g. "W1ABC"
    pub ssid: Option<String>, // e.g. "9" for W1ABC-9
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radio: Option<String>,   // e.g. "146.520MHz"
    pub comment: Option<String>, // free text after the position
}

impl Report {
    /// `CALL-SSID`, or just `CALL` without a sub-identifier.
    pub fn source_id(&self) -> String {
        match self.ssid.as_deref() {
            Some(ssid) if !ssid.is_empty() => format!("{}-{}", self.call, ssid),
            _ => self.call.clone(),
        }
    }

    pub fn location(&self) -> Option<LatLon> {
        Some(LatLon::new(self.latitude?, self.longitude?))
    }
}
