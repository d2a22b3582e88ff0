//! # Indexes
//! Immutable lookup structures built once from the configured watch targets.
//!
//! - [`SpatialIndex`]: geohash bucket → targets whose home lies in that bucket.
//! - [`InclusionIndex`]: source identifier → targets that explicitly list it.
//!
//! Both keep configuration order inside each list and hold `Arc`s to the
//! same `WatchTarget`s, so they can be shared across tasks without locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::WatchTarget;
use crate::geo::{self, LatLon};

#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    precision: usize,
    buckets: HashMap<String, Vec<Arc<WatchTarget>>>,
}

impl SpatialIndex {
    pub fn build(targets: &[Arc<WatchTarget>], precision: usize) -> Self {
        let mut buckets: HashMap<String, Vec<Arc<WatchTarget>>> = HashMap::new();
        for target in targets {
            let Some(key) = geo::geohash(target.home, precision) else {
                warn!(label = %target.label, home = %target.home, precision, "no bucket for target");
                continue;
            };
            debug!(bucket = %key, label = %target.label, "assigning bucket");
            buckets.entry(key).or_default().push(Arc::clone(target));
        }
        Self { precision, buckets }
    }

    /// Bucket key of `point` at this index's precision; `None` for
    /// out-of-range coordinates.
    pub fn bucket_key(&self, point: LatLon) -> Option<String> {
        geo::geohash(point, self.precision)
    }

    pub fn targets_in(&self, bucket: &str) -> Option<&[Arc<WatchTarget>]> {
        self.buckets.get(bucket).map(Vec::as_slice)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InclusionIndex {
    by_source: HashMap<String, Vec<Arc<WatchTarget>>>,
}

impl InclusionIndex {
    pub fn build(targets: &[Arc<WatchTarget>]) -> Self {
        let mut by_source: HashMap<String, Vec<Arc<WatchTarget>>> = HashMap::new();
        for target in targets {
            for source in &target.include {
                by_source
                    .entry(source.clone())
                    .or_default()
                    .push(Arc::clone(target));
            }
        }
        Self { by_source }
    }

    /// Targets listing exactly `source` (`CALL` or `CALL-SSID`).
    pub fn matches(&self, source: &str) -> &[Arc<WatchTarget>] {
        self.by_source
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn source_count(&self) -> usize {
        self.by_source.len()
    }
}
