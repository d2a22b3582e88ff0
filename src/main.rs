//! Beacon watch: binary entrypoint.
//! Connects to APRS-IS, routes every position report through the proximity
//! and inclusion pipelines, and pushes alerts to each watch target.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use beacon_watch::config::AppConfig;
use beacon_watch::dedupe::spawn_sweeper;
use beacon_watch::ingest::aprs_is::{AprsIsClient, AprsIsConfig};
use beacon_watch::ingest::{route_reports, REPORT_CHANNEL_CAPACITY};
use beacon_watch::license::CallookClient;
use beacon_watch::metrics::{Metrics, ENV_METRICS_ADDR};
use beacon_watch::notify::{LogNotifier, Notifier, PushoverNotifier};

const SWEEP_PERIOD: Duration = Duration::from_secs(300);

/// Compact logs by default; `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("beacon_watch=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn dry_run() -> bool {
    std::env::var("DRY_RUN").ok().is_some_and(|v| v == "1")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match AppConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %AppConfig::default_path().display(), "config error: {e}");
            std::process::exit(1);
        }
    };

    if let Ok(addr) = std::env::var(ENV_METRICS_ADDR) {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("{ENV_METRICS_ADDR} is not a socket address: {addr}"))?;
        let metrics = Metrics::install()?;
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(addr).await {
                tracing::error!("metrics endpoint stopped: {e:#}");
            }
        });
    }

    let lookup = Arc::new(CallookClient::from_env()?);
    let notifier: Arc<dyn Notifier> = if dry_run() {
        tracing::warn!("DRY_RUN=1: alerts are logged, not pushed");
        Arc::new(LogNotifier)
    } else {
        Arc::new(PushoverNotifier::from_env())
    };

    let router = beacon_watch::build_router(&config, lookup, notifier);
    let sweeper = spawn_sweeper(router.caches().clone(), SWEEP_PERIOD);

    let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
    let feed = AprsIsClient::new(AprsIsConfig {
        server: config.aprs_server.clone(),
        login: config.my_call.clone(),
        filter: config.aprs_filter.clone(),
    });
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed.run(tx).await {
            tracing::error!(target: "feed", "feed stopped: {e:#}");
        }
    });

    tokio::select! {
        _ = route_reports(router, rx) => {
            tracing::warn!("routing loop ended");
        }
        res = tokio::signal::ctrl_c() => {
            res.context("listen for ctrl-c")?;
            tracing::info!("shutdown requested");
        }
    }

    feed_task.abort();
    sweeper.abort();
    Ok(())
}
