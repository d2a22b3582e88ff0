// src/dedupe.rs
use std::{sync::Arc, time::Duration};

use metrics::gauge;
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::Instant};

use crate::ttl::TtlMap;

/// Routing path a notification went through. Each path has its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Proximity,
    Inclusion,
}

impl Pipeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::Proximity => "proximity",
            Pipeline::Inclusion => "inclusion",
        }
    }
}

/// Per-source cooldown gate.
/// - First notification for a source always passes.
/// - Inside the window, further notifications for that source are suppressed.
/// - State is updated explicitly via `mark_notified` after a confirmed send.
///
/// Keys are source identifiers only, never (source, watch target): one
/// successful send suppresses that source for every target on this pipeline.
#[derive(Debug)]
pub struct DedupeCache {
    pipeline: Pipeline,
    entries: TtlMap<()>,
}

impl DedupeCache {
    pub fn new(pipeline: Pipeline, window: Duration) -> Self {
        Self {
            pipeline,
            entries: TtlMap::new(window),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn window(&self) -> Duration {
        self.entries.ttl()
    }

    /// Check if `source` was notified within the window at `now`. Does NOT mutate state
    /// beyond dropping an expired entry.
    pub fn should_suppress_at(&self, source: &str, now: Instant) -> bool {
        self.entries.get_at(source, now).is_some()
    }

    pub fn should_suppress(&self, source: &str) -> bool {
        self.should_suppress_at(source, Instant::now())
    }

    /// Record a successful notification for `source` at `now`.
    pub fn mark_notified_at(&self, source: &str, now: Instant) {
        self.entries.insert_at(source, (), now);
    }

    pub fn mark_notified(&self, source: &str) {
        self.mark_notified_at(source, Instant::now())
    }

    pub fn purge_expired(&self) -> usize {
        self.entries.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two independent windows, one per pipeline.
#[derive(Debug)]
pub struct DedupeCaches {
    pub proximity: DedupeCache,
    pub inclusion: DedupeCache,
}

impl DedupeCaches {
    pub fn new(proximity_window: Duration, inclusion_window: Duration) -> Self {
        Self {
            proximity: DedupeCache::new(Pipeline::Proximity, proximity_window),
            inclusion: DedupeCache::new(Pipeline::Inclusion, inclusion_window),
        }
    }

    pub fn get(&self, pipeline: Pipeline) -> &DedupeCache {
        match pipeline {
            Pipeline::Proximity => &self.proximity,
            Pipeline::Inclusion => &self.inclusion,
        }
    }
}

/// Periodically drop expired entries so idle sources do not pile up.
pub fn spawn_sweeper(caches: Arc<DedupeCaches>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            for cache in [&caches.proximity, &caches.inclusion] {
                let removed = cache.purge_expired();
                gauge!("dedupe_entries", "pipeline" => cache.pipeline().as_str())
                    .set(cache.len() as f64);
                if removed > 0 {
                    tracing::debug!(
                        pipeline = cache.pipeline().as_str(),
                        removed,
                        "purged expired dedupe entries"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn first_notification_passes() {
        let cache = DedupeCache::new(Pipeline::Proximity, HOUR);
        assert!(!cache.should_suppress_at("W1ABC", Instant::now()));
    }

    #[test]
    fn inside_window_suppressed() {
        let cache = DedupeCache::new(Pipeline::Proximity, HOUR);
        let t0 = Instant::now();
        cache.mark_notified_at("W1ABC", t0);
        let t1 = t0 + HOUR - Duration::from_millis(1);
        assert!(cache.should_suppress_at("W1ABC", t1));
        // other sources unaffected
        assert!(!cache.should_suppress_at("W1ABC-9", t1));
    }

    #[test]
    fn after_window_passes() {
        let cache = DedupeCache::new(Pipeline::Inclusion, HOUR);
        let t0 = Instant::now();
        cache.mark_notified_at("W1ABC", t0);
        let t_after = t0 + HOUR + Duration::from_millis(1);
        assert!(!cache.should_suppress_at("W1ABC", t_after));
    }

    #[test]
    fn pipelines_do_not_share_state() {
        let caches = DedupeCaches::new(HOUR, 4 * HOUR);
        let now = Instant::now();
        caches.get(Pipeline::Proximity).mark_notified_at("W1ABC", now);

        assert!(caches.proximity.should_suppress_at("W1ABC", now));
        assert!(!caches.inclusion.should_suppress_at("W1ABC", now));
        assert_eq!(caches.inclusion.window(), 4 * HOUR);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_entries() {
        let caches = Arc::new(DedupeCaches::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        caches.proximity.mark_notified("W1ABC");
        caches.inclusion.mark_notified("K2XYZ");

        let handle = spawn_sweeper(caches.clone(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(91)).await;

        assert!(caches.proximity.is_empty());
        assert!(caches.inclusion.is_empty());
        handle.abort();
    }
}
