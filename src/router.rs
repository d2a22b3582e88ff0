//! # Event Router
//! Decides, for each incoming report, which watch targets hear about it.
//!
//! Per report (no state kept between reports):
//! 1. no position → dropped;
//! 2. inclusion matches (bare call, then `CALL-SSID`) → inclusion pipeline,
//!    regardless of distance;
//! 3. targets in the report's geohash bucket → proximity pipeline, in
//!    configuration order: exclude → duplicate → threshold (strict `<`).
//!
//! Policy checks run inline in [`EventRouter::route`], one report at a time
//! in arrival order. Each delivery (license lookup + send + dedupe mark) is
//! its own task, so a slow transport never blocks routing. Dedupe entries
//! are written only after a confirmed send; two reports racing ahead of that
//! write may both go out.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WatchTarget;
use crate::dedupe::{DedupeCaches, Pipeline};
use crate::format::{Alert, Phrase};
use crate::geo::{self, Proximity};
use crate::index::{InclusionIndex, SpatialIndex};
use crate::ingest::Report;
use crate::license::LicenseService;
use crate::notify::{aprs_fi_link, Notification, Notifier};

/// Result of running one pipeline for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Sent,
    DispatchFailed,
    Excluded,
    Duplicate,
    BelowThreshold,
}

impl Verdict {
    fn as_str(&self) -> &'static str {
        match self {
            Verdict::Sent => "sent",
            Verdict::DispatchFailed => "dispatch_failed",
            Verdict::Excluded => "excluded",
            Verdict::Duplicate => "duplicate",
            Verdict::BelowThreshold => "below_threshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteOutcome {
    pub pipeline: Pipeline,
    pub target: String,
    pub verdict: Verdict,
}

struct Inner {
    spatial: SpatialIndex,
    inclusion: InclusionIndex,
    caches: Arc<DedupeCaches>,
    licenses: LicenseService,
    notifier: Arc<dyn Notifier>,
    priority: i8,
}

/// Cheap to clone; every clone shares the same indexes and caches.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<Inner>,
}

/// Decisions for one report; deliveries may still be in flight.
pub struct PendingRoute {
    slots: Vec<Slot>,
}

impl PendingRoute {
    /// Number of targets this report was routed to.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Wait for in-flight deliveries. Outcomes are listed inclusion first,
    /// then proximity, each in index order.
    pub async fn finish(self) -> Vec<RouteOutcome> {
        let mut outcomes = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            outcomes.push(match slot {
                Slot::Done(outcome) => outcome,
                Slot::Pending {
                    pipeline,
                    target,
                    handle,
                } => {
                    let verdict = handle.await.unwrap_or_else(|e| {
                        warn!(target: "notify", label = %target, "delivery task failed: {e}");
                        Verdict::DispatchFailed
                    });
                    RouteOutcome {
                        pipeline,
                        target,
                        verdict,
                    }
                }
            });
        }
        outcomes
    }
}

enum Slot {
    Done(RouteOutcome),
    Pending {
        pipeline: Pipeline,
        target: String,
        handle: JoinHandle<Verdict>,
    },
}

impl EventRouter {
    pub fn new(
        spatial: SpatialIndex,
        inclusion: InclusionIndex,
        caches: Arc<DedupeCaches>,
        licenses: LicenseService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                spatial,
                inclusion,
                caches,
                licenses,
                notifier,
                priority: 1,
            }),
        }
    }

    /// Transport priority for every alert. Call before cloning the router.
    pub fn with_priority(mut self, priority: i8) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.priority = priority,
            None => warn!("router already shared; priority {priority} ignored"),
        }
        self
    }

    pub fn caches(&self) -> &Arc<DedupeCaches> {
        &self.inner.caches
    }

    /// Route one report and wait for its deliveries.
    pub async fn process(&self, report: Report) -> Vec<RouteOutcome> {
        self.route(report).finish().await
    }

    /// Take every policy decision for `report` now and spawn its deliveries.
    /// Must be called from within a tokio runtime.
    pub fn route(&self, report: Report) -> PendingRoute {
        counter!("reports_total").increment(1);

        let Some(point) = report.location() else {
            counter!("reports_without_position_total").increment(1);
            debug!(target: "beacon", source = %report.source_id(), "no position; skipped");
            return PendingRoute { slots: Vec::new() };
        };

        let source = report.source_id();
        let report = Arc::new(report);
        let mut slots = Vec::new();

        for target in self.inclusion_matches(&report) {
            let proximity = geo::distance_and_bearing(point, target.home);
            slots.push(self.run_inclusion(target, &report, &source, proximity));
        }

        let Some(bucket) = self.inner.spatial.bucket_key(point) else {
            return PendingRoute { slots };
        };
        if let Some(targets) = self.inner.spatial.targets_in(&bucket) {
            for target in targets {
                let proximity = geo::distance_and_bearing(point, target.home);
                slots.push(self.run_proximity(target, &report, &source, &bucket, proximity));
            }
        }

        PendingRoute { slots }
    }

    /// Targets listing the bare call, then the full `CALL-SSID`; each target once.
    fn inclusion_matches(&self, report: &Report) -> Vec<Arc<WatchTarget>> {
        let mut keys = vec![report.call.clone()];
        let full = report.source_id();
        if full != report.call {
            keys.push(full);
        }

        let mut out: Vec<Arc<WatchTarget>> = Vec::new();
        for key in &keys {
            for target in self.inner.inclusion.matches(key) {
                if !out.iter().any(|t| Arc::ptr_eq(t, target)) {
                    out.push(Arc::clone(target));
                }
            }
        }
        out
    }

    fn run_inclusion(
        &self,
        target: Arc<WatchTarget>,
        report: &Arc<Report>,
        source: &str,
        proximity: Proximity,
    ) -> Slot {
        let pipeline = Pipeline::Inclusion;
        if self.inner.caches.inclusion.should_suppress(source) {
            log_outcome(&target, report, proximity, Phrase::Duplicate);
            return done(pipeline, &target, Verdict::Duplicate);
        }
        self.spawn_delivery(pipeline, target, Arc::clone(report), proximity)
    }

    fn run_proximity(
        &self,
        target: &Arc<WatchTarget>,
        report: &Arc<Report>,
        source: &str,
        bucket: &str,
        proximity: Proximity,
    ) -> Slot {
        let pipeline = Pipeline::Proximity;
        if target.excludes(source) {
            log_outcome(target, report, proximity, Phrase::Excluded);
            return done(pipeline, target, Verdict::Excluded);
        }
        if self.inner.caches.proximity.should_suppress(source) {
            log_outcome(target, report, proximity, Phrase::Duplicate);
            return done(pipeline, target, Verdict::Duplicate);
        }
        if proximity.miles < target.threshold_miles {
            return self.spawn_delivery(pipeline, Arc::clone(target), Arc::clone(report), proximity);
        }
        log_outcome(target, report, proximity, Phrase::BelowThreshold { bucket });
        done(pipeline, target, Verdict::BelowThreshold)
    }

    fn spawn_delivery(
        &self,
        pipeline: Pipeline,
        target: Arc<WatchTarget>,
        report: Arc<Report>,
        proximity: Proximity,
    ) -> Slot {
        let label = target.label.clone();
        let inner = Arc::clone(&self.inner);
        let handle =
            tokio::spawn(async move { inner.deliver(pipeline, &target, &report, proximity).await });
        Slot::Pending {
            pipeline,
            target: label,
            handle,
        }
    }
}

impl Inner {
    async fn deliver(
        &self,
        pipeline: Pipeline,
        target: &WatchTarget,
        report: &Report,
        proximity: Proximity,
    ) -> Verdict {
        let license = self.licenses.resolve(&report.call).await;
        let phrase = match pipeline {
            Pipeline::Inclusion => Phrase::Beacon,
            Pipeline::Proximity => Phrase::NearbyBeacon,
        };
        let message = Alert {
            target,
            report,
            proximity,
            phrase,
            license: license.as_deref(),
        }
        .render(Utc::now());
        info!(target: "beacon", "{message}");

        let source = report.source_id();
        let notification = Notification {
            message,
            priority: self.priority,
            url: Some(aprs_fi_link(&source)),
        };

        match self.notifier.send(&target.credentials, &notification).await {
            Ok(()) => {
                self.caches.get(pipeline).mark_notified(&source);
                counter!("notifications_sent_total", "pipeline" => pipeline.as_str()).increment(1);
                Verdict::Sent
            }
            Err(e) => {
                counter!("notifications_failed_total", "pipeline" => pipeline.as_str())
                    .increment(1);
                warn!(
                    target: "notify",
                    label = %target.label,
                    source = %source,
                    transport = self.notifier.name(),
                    "Error sending push notification: {e:#}"
                );
                Verdict::DispatchFailed
            }
        }
    }
}

fn done(pipeline: Pipeline, target: &WatchTarget, verdict: Verdict) -> Slot {
    counter!("suppressed_total", "reason" => verdict.as_str()).increment(1);
    Slot::Done(RouteOutcome {
        pipeline,
        target: target.label.clone(),
        verdict,
    })
}

fn log_outcome(target: &WatchTarget, report: &Report, proximity: Proximity, phrase: Phrase<'_>) {
    let line = Alert {
        target,
        report,
        proximity,
        phrase,
        license: None,
    }
    .render(Utc::now());
    info!(target: "beacon", "{line}");
}
