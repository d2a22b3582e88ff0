// src/ingest/packet.rs
//! Minimal TNC2 decoder: `SRC[-SSID]>DEST[,PATH]:payload`.
//!
//! Only uncompressed lat/long positions (`!`, `=`, `/`, `@`) yield
//! coordinates. Every other payload still produces a `Report` for its source,
//! without a location, so routing can drop it like any position-less packet.

use once_cell::sync::OnceCell;
use regex::Regex;

use super::types::Report;

/// Decode one feed line. `None` for server comments and malformed headers.
pub fn parse_tnc2(line: &str) -> Option<Report> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (header, payload) = line.split_once(':')?;
    let (source, _path) = header.split_once('>')?;
    let (call, ssid) = split_source(source)?;

    let mut report = Report {
        call,
        ssid,
        ..Default::default()
    };

    if let Some(body) = position_body(payload) {
        if let Some((lat, lon, rest)) = parse_uncompressed(body) {
            report.latitude = Some(lat);
            report.longitude = Some(lon);
            let (radio, comment) = split_radio(rest);
            report.radio = radio;
            report.comment = comment;
        }
    }

    Some(report)
}

fn split_source(source: &str) -> Option<(String, Option<String>)> {
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    let (call, ssid) = match source.split_once('-') {
        Some((call, ssid)) => (call, Some(ssid.trim().to_ascii_uppercase())),
        None => (source, None),
    };
    let call = call.trim().to_ascii_uppercase();
    if call.is_empty() || !call.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((call, ssid.filter(|s| !s.is_empty())))
}

/// Payload slice right after the data type identifier (and timestamp, if any).
fn position_body(payload: &str) -> Option<&str> {
    match payload.chars().next()? {
        '!' | '=' => payload.get(1..),
        // 7-char timestamp: DDHHMMz / HHMMSSh / DDHHMM/
        '/' | '@' => payload.get(8..),
        _ => None,
    }
}

/// `DDMM.mmN` + table + `DDDMM.mmW` + symbol, then the comment.
fn parse_uncompressed(body: &str) -> Option<(f64, f64, &str)> {
    let lat_raw = body.get(0..8)?;
    let lon_raw = body.get(9..18)?;
    // symbol code must exist
    body.get(18..19)?;
    let rest = body.get(19..).unwrap_or_default();

    let lat = parse_coord(lat_raw, 2, 'N', 'S')?;
    let lon = parse_coord(lon_raw, 3, 'E', 'W')?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some((lat, lon, rest))
}

fn parse_coord(raw: &str, deg_len: usize, pos: char, neg: char) -> Option<f64> {
    // position ambiguity replaces trailing digits with spaces
    let raw = raw.replace(' ', "0");
    let hemi = raw.chars().last()?;
    let number = raw.get(..raw.len() - 1)?;
    let deg: f64 = number.get(..deg_len)?.parse().ok()?;
    let min: f64 = number.get(deg_len..)?.parse().ok()?;
    if !(0.0..60.0).contains(&min) {
        return None;
    }
    let value = deg + min / 60.0;
    match hemi.to_ascii_uppercase() {
        h if h == pos => Some(value),
        h if h == neg => Some(-value),
        _ => None,
    }
}

/// Split a leading `FFF.FFFMHz` frequency off the comment.
fn split_radio(rest: &str) -> (Option<String>, Option<String>) {
    static RE_FREQ: OnceCell<Regex> = OnceCell::new();
    let re = RE_FREQ.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d{3}\.\d{2,3})\s?MHz").expect("frequency regex")
    });

    let (radio, comment) = match re.captures(rest) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let freq = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            (Some(format!("{freq}MHz")), &rest[whole..])
        }
        None => (None, rest),
    };

    let comment = comment.trim();
    let comment = (!comment.is_empty()).then(|| comment.to_string());
    (radio, comment)
}
