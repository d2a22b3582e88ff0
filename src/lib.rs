// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod dedupe;
pub mod format;
pub mod geo;
pub mod index;
pub mod ingest;
pub mod license;
pub mod metrics;
pub mod notify;
pub mod router;
pub mod ttl;

// ---- Re-exports for stable public API ----
pub use crate::config::{AppConfig, ConfigError, WatchTarget};
pub use crate::dedupe::{DedupeCache, DedupeCaches, Pipeline};
pub use crate::ingest::Report;
pub use crate::notify::{Credentials, Notification, Notifier};
pub use crate::router::{EventRouter, RouteOutcome, Verdict};

use std::sync::Arc;

use crate::index::{InclusionIndex, SpatialIndex};
use crate::license::{LicenseCache, LicenseLookup, LicenseService};

/// Wire a router from loaded configuration: both indexes, fresh dedupe
/// windows and the license cache.
pub fn build_router(
    config: &AppConfig,
    lookup: Arc<dyn LicenseLookup>,
    notifier: Arc<dyn Notifier>,
) -> EventRouter {
    let spatial = SpatialIndex::build(&config.targets, config.hash_precision);
    let inclusion = InclusionIndex::build(&config.targets);
    let caches = Arc::new(DedupeCaches::new(
        config.nearby_dedupe,
        config.includes_dedupe,
    ));
    let licenses = LicenseService::new(LicenseCache::new(config.license_ttl), lookup);

    tracing::info!(
        targets = config.targets.len(),
        buckets = spatial.bucket_count(),
        included_sources = inclusion.source_count(),
        precision = config.hash_precision,
        "router ready"
    );

    EventRouter::new(spatial, inclusion, caches, licenses, notifier)
        .with_priority(config.pushover_priority)
}
