// src/ingest/mod.rs
pub mod aprs_is;
pub mod packet;
pub mod types;

use tokio::sync::mpsc;

use crate::router::EventRouter;

pub use types::Report;

/// Bounded buffer between the feed task and routing.
pub const REPORT_CHANNEL_CAPACITY: usize = 1024;

/// Drain reports in arrival order. Routing decisions are taken inline, one
/// report at a time; only deliveries run in the background, so slow sends
/// never hold up the feed. Returns when every sender is gone.
pub async fn route_reports(router: EventRouter, mut rx: mpsc::Receiver<Report>) {
    while let Some(report) = rx.recv().await {
        let pending = router.route(report);
        if pending.is_empty() {
            continue;
        }
        tokio::spawn(async move {
            let outcomes = pending.finish().await;
            tracing::debug!(target: "beacon", routed = outcomes.len(), "deliveries settled");
        });
    }
    tracing::info!(target: "feed", "report channel closed");
}
