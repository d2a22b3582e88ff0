// tests/router_e2e.rs
mod common;

use std::sync::Arc;

use beacon_watch::geo::{distance_and_bearing, LatLon};
use beacon_watch::ingest::route_reports;
use beacon_watch::{Pipeline, RouteOutcome, Verdict};
use tokio::sync::mpsc;
use common::*;

fn outcome(pipeline: Pipeline, target: &str, verdict: Verdict) -> RouteOutcome {
    RouteOutcome {
        pipeline,
        target: target.into(),
        verdict,
    }
}

#[tokio::test(start_paused = true)]
async fn nearby_beacon_sent_then_deduped_then_sent_again() {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![target("home", 34.0, -118.0, 5.0)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );

    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Sent)]);
    assert_eq!(notifier.count(), 1);

    let msg = &notifier.messages()[0];
    assert!(msg.contains("UTC (home) Nearby beacon: W1ABC-9 0.7 mi N"), "{msg}");
    assert!(msg.ends_with("- Jane Doe (E)"), "{msg}");
    {
        let sent = notifier.sent.lock().unwrap();
        let (creds, n) = &sent[0];
        assert_eq!(creds.user, "user-home");
        assert_eq!(n.priority, 1);
        assert_eq!(n.url.as_deref(), Some("https://aprs.fi/#!call=a%2FW1ABC-9"));
    }

    tokio::time::advance(HOUR / 2).await;
    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Duplicate)]);
    assert_eq!(notifier.count(), 1);

    tokio::time::advance(HOUR / 2).await;
    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Sent)]);
    assert_eq!(notifier.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn excluded_source_is_never_sent() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut home = target("home", 34.0, -118.0, 5.0);
    home.exclude.insert("W1ABC-9".into());
    let router = router_with(vec![home], Arc::new(StaticLookup), notifier.clone());

    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Excluded)]);

    // exclusion is by full source id; other SSIDs still alert
    let out = router.process(report("W1ABC", Some("7"), 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Sent)]);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn threshold_is_strictly_less_than() {
    let home = LatLon::new(34.0, -118.0);
    let miles = distance_and_bearing(LatLon::new(34.01, -118.0), home).miles;

    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![target("home", 34.0, -118.0, miles)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );
    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::BelowThreshold)]);
    assert_eq!(notifier.count(), 0);

    let router = router_with(
        vec![target("home", 34.0, -118.0, miles + 1e-9)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );
    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Sent)]);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn inclusion_ignores_distance_and_has_its_own_window() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut far = target("nyc", 40.7, -74.0, 1.0);
    far.include = vec!["W1ABC".into()];
    let router = router_with(
        vec![far, target("home", 34.0, -118.0, 5.0)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );

    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(
        out,
        vec![
            outcome(Pipeline::Inclusion, "nyc", Verdict::Sent),
            outcome(Pipeline::Proximity, "home", Verdict::Sent),
        ]
    );
    let mut users = notifier.users();
    users.sort();
    assert_eq!(users, vec!["user-home", "user-nyc"]);
    assert!(notifier
        .messages()
        .iter()
        .any(|m| m.contains("(nyc) Beacon: W1ABC-9")));

    // proximity window (60 min) has lapsed, inclusion window (240 min) has not
    tokio::time::advance(HOUR).await;
    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(
        out,
        vec![
            outcome(Pipeline::Inclusion, "nyc", Verdict::Duplicate),
            outcome(Pipeline::Proximity, "home", Verdict::Sent),
        ]
    );

    tokio::time::advance(3 * HOUR).await;
    let out = router.process(report("W1ABC", Some("9"), 36.5, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Inclusion, "nyc", Verdict::Sent)]);
}

#[tokio::test(start_paused = true)]
async fn inclusion_by_full_id_and_bare_call_alerts_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut far = target("nyc", 40.7, -74.0, 1.0);
    far.include = vec!["W1ABC".into(), "W1ABC-9".into()];
    let router = router_with(vec![far], Arc::new(StaticLookup), notifier.clone());

    let out = router.process(report("W1ABC", Some("9"), 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Inclusion, "nyc", Verdict::Sent)]);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn proximity_dedupe_is_shared_across_targets() {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![
            target("home", 34.0, -118.0, 5.0),
            target("work", 34.05, -118.05, 10.0),
        ],
        Arc::new(StaticLookup),
        notifier.clone(),
    );

    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(
        out,
        vec![
            outcome(Pipeline::Proximity, "home", Verdict::Sent),
            outcome(Pipeline::Proximity, "work", Verdict::Sent),
        ]
    );

    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(
        out,
        vec![
            outcome(Pipeline::Proximity, "home", Verdict::Duplicate),
            outcome(Pipeline::Proximity, "work", Verdict::Duplicate),
        ]
    );
    assert_eq!(notifier.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_dispatch_leaves_source_eligible() {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![target("home", 34.0, -118.0, 5.0)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );

    notifier.set_failing(true);
    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::DispatchFailed)]);
    assert!(router.caches().proximity.is_empty());

    notifier.set_failing(false);
    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Sent)]);
    assert!(router.caches().proximity.should_suppress("W1ABC"));
}

#[tokio::test(start_paused = true)]
async fn license_failure_does_not_block_the_alert() {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![target("home", 34.0, -118.0, 5.0)],
        Arc::new(FailingLookup),
        notifier.clone(),
    );

    let out = router.process(report("W1ABC", None, 34.01, -118.0)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "home", Verdict::Sent)]);
    let msg = &notifier.messages()[0];
    assert!(msg.ends_with("W1ABC 0.7 mi N"), "{msg}");
}

#[tokio::test(start_paused = true)]
async fn reports_without_position_or_outside_buckets_are_ignored() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut home = target("home", 34.0, -118.0, 5.0);
    home.include = vec!["K2XYZ".into()];
    let router = router_with(vec![home], Arc::new(StaticLookup), notifier.clone());

    let mut no_fix = report("K2XYZ", None, 34.01, -118.0);
    no_fix.latitude = None;
    assert!(router.process(no_fix).await.is_empty());

    let out = router.process(report("W1ABC", None, 40.7, -74.0)).await;
    assert!(out.is_empty());
    assert_eq!(notifier.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_latitude_is_a_real_position() {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![target("gulf", 0.0, 0.0, 5.0)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );

    let out = router.process(report("W1ABC", None, 0.0, 0.01)).await;
    assert_eq!(out, vec![outcome(Pipeline::Proximity, "gulf", Verdict::Sent)]);
}

#[tokio::test(start_paused = true)]
async fn decisions_are_taken_when_the_report_is_routed() {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = router_with(
        vec![target("home", 34.0, -118.0, 5.0)],
        Arc::new(StaticLookup),
        notifier.clone(),
    );
    router.process(report("W1ABC", None, 34.01, -118.0)).await;

    let pending = router.route(report("W1ABC", None, 34.01, -118.0));
    assert_eq!(pending.len(), 1);

    // the window lapsing after routing does not change the verdict
    tokio::time::advance(2 * HOUR).await;
    assert_eq!(
        pending.finish().await,
        vec![outcome(Pipeline::Proximity, "home", Verdict::Duplicate)]
    );
    assert_eq!(notifier.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn route_reports_drains_the_channel_in_order() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut home = target("home", 34.0, -118.0, 5.0);
    home.exclude.insert("K2XYZ".into());
    let router = router_with(vec![home], Arc::new(StaticLookup), notifier.clone());
    let caches = router.caches().clone();

    let (tx, rx) = mpsc::channel(8);
    tx.send(report("W1ABC", None, 34.01, -118.0)).await.unwrap();
    tx.send(report("K2XYZ", None, 34.01, -118.0)).await.unwrap();
    tx.send(report("N0FAR", None, 0.0, 0.0)).await.unwrap();
    drop(tx);

    route_reports(router, rx).await;
    // let the background deliveries settle
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    assert_eq!(notifier.count(), 1);
    assert!(notifier.messages()[0].contains("Nearby beacon: W1ABC "));
    assert!(caches.proximity.should_suppress("W1ABC"));
    assert!(!caches.proximity.should_suppress("K2XYZ"));
}
