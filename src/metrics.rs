use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("reports_total", "Position reports received from the feed.");
        describe_counter!(
            "reports_without_position_total",
            "Reports dropped for lacking latitude or longitude."
        );
        describe_counter!(
            "notifications_sent_total",
            "Alerts confirmed by the push transport, by pipeline."
        );
        describe_counter!(
            "notifications_failed_total",
            "Alerts the push transport rejected, by pipeline."
        );
        describe_counter!(
            "suppressed_total",
            "Pipeline evaluations that ended without a send, by reason."
        );
        describe_counter!("license_lookup_errors_total", "Failed license lookups.");
        describe_counter!("feed_reconnects_total", "APRS-IS reconnect attempts.");
        describe_counter!(
            "feed_parse_skipped_total",
            "Feed lines that did not decode into a report."
        );
        describe_gauge!("dedupe_entries", "Live dedupe entries, by pipeline.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format, plus a `/health` probe.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind metrics listener on {addr}"))?;
        tracing::info!(%addr, "metrics endpoint listening");
        axum::serve(listener, self.router())
            .await
            .context("metrics server")
    }
}
