//! # Alert text
//! Builds the single-line message used both for push notifications and for
//! the outcome log lines:
//!
//! `<time> (<label>) <phrase>: <source> <miles> mi [<dir>] [(<radio>)] [(<comment>)] [- <license>]`

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::WatchTarget;
use crate::geo::Proximity;
use crate::ingest::Report;

/// What happened to a report for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase<'a> {
    /// Sent through the inclusion pipeline.
    Beacon,
    /// Sent through the proximity pipeline.
    NearbyBeacon,
    Excluded,
    Duplicate,
    /// In the target's bucket but not under its threshold.
    BelowThreshold { bucket: &'a str },
}

impl fmt::Display for Phrase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phrase::Beacon => f.write_str("Beacon"),
            Phrase::NearbyBeacon => f.write_str("Nearby beacon"),
            Phrase::Excluded => f.write_str("Excluded beacon"),
            Phrase::Duplicate => f.write_str("Duplicate beacon"),
            Phrase::BelowThreshold { bucket } => {
                write!(f, "Nearby beacon in {bucket} but not close enough to notify")
            }
        }
    }
}

/// Everything needed to render one alert line.
#[derive(Debug, Clone, Copy)]
pub struct Alert<'a> {
    pub target: &'a WatchTarget,
    pub report: &'a Report,
    pub proximity: Proximity,
    pub phrase: Phrase<'a>,
    pub license: Option<&'a str>,
}

impl Alert<'_> {
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let time = now
            .with_timezone(&self.target.tz())
            .format("%Y-%m-%d %H:%M:%S %Z");

        let direction = self
            .proximity
            .bearing
            .map(|b| b.as_str())
            .unwrap_or_default();
        let radio = annotation(self.report.radio.as_deref());
        let comment = annotation(self.report.comment.as_deref());
        let license = self
            .license
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| format!("- {l}"))
            .unwrap_or_default();

        let line = format!(
            "{time} ({label}) {phrase}: {source} {miles:.1} mi {direction} {radio} {comment} {license}",
            label = self.target.label,
            phrase = self.phrase,
            source = self.report.source_id(),
            miles = self.proximity.rounded_miles(),
        );
        collapse_whitespace(&line)
    }
}

/// `(text)` for non-blank input, empty otherwise.
fn annotation(text: Option<&str>) -> String {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => format!("({t})"),
        _ => String::new(),
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}
