// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use beacon_watch::dedupe::DedupeCaches;
use beacon_watch::geo::LatLon;
use beacon_watch::index::{InclusionIndex, SpatialIndex};
use beacon_watch::license::{CurrentLicense, LicenseCache, LicenseLookup, LicenseRecord, LicenseService};
use beacon_watch::notify::{Credentials, Notification, Notifier};
use beacon_watch::{EventRouter, Report, WatchTarget};

pub const HOUR: Duration = Duration::from_secs(3600);

/// Captures every notification; can be switched into failure mode.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Credentials, Notification)>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.message.clone())
            .collect()
    }

    pub fn users(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.user.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &Credentials, notification: &Notification) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("transport down");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.clone(), notification.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct StaticLookup;

#[async_trait::async_trait]
impl LicenseLookup for StaticLookup {
    async fn fetch(&self, _call: &str) -> Result<LicenseRecord> {
        Ok(LicenseRecord {
            name: Some("JANE DOE".into()),
            current: Some(CurrentLicense {
                oper_class: Some("E".into()),
            }),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct FailingLookup;

#[async_trait::async_trait]
impl LicenseLookup for FailingLookup {
    async fn fetch(&self, _call: &str) -> Result<LicenseRecord> {
        anyhow::bail!("lookup unavailable")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub fn target(label: &str, lat: f64, lon: f64, threshold_miles: f64) -> WatchTarget {
    WatchTarget {
        label: label.into(),
        home: LatLon::new(lat, lon),
        threshold_miles,
        exclude: HashSet::new(),
        include: vec![],
        credentials: Credentials {
            user: format!("user-{label}"),
            token: format!("token-{label}"),
        },
        timezone: None,
    }
}

pub fn report(call: &str, ssid: Option<&str>, lat: f64, lon: f64) -> Report {
    Report {
        call: call.into(),
        ssid: ssid.map(String::from),
        latitude: Some(lat),
        longitude: Some(lon),
        ..Default::default()
    }
}

/// Router over `targets` with 60 min proximity / 240 min inclusion windows.
pub fn router_with(
    targets: Vec<WatchTarget>,
    lookup: Arc<dyn LicenseLookup>,
    notifier: Arc<RecordingNotifier>,
) -> EventRouter {
    let targets: Vec<Arc<WatchTarget>> = targets.into_iter().map(Arc::new).collect();
    EventRouter::new(
        SpatialIndex::build(&targets, 3),
        InclusionIndex::build(&targets),
        Arc::new(DedupeCaches::new(HOUR, 4 * HOUR)),
        LicenseService::new(LicenseCache::new(14 * 24 * HOUR), lookup),
        notifier,
    )
}
