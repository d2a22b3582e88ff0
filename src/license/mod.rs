//! License enrichment: provider abstraction + in-memory TTL cache.
//!
//! Lookups are best-effort. A failed lookup is logged, never cached, and
//! retried the next time the same call shows up; alerts go out without it.

pub mod callook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::ttl::TtlMap;

pub use callook::CallookClient;

/// Fields of a license record that end up in alert text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current: Option<CurrentLicense>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentLicense {
    #[serde(default, rename = "operClass")]
    pub oper_class: Option<String>,
}

/// `"Unknown license"` without a name, otherwise the title-cased name with the
/// operator class in parentheses when known.
pub fn format_license(record: &LicenseRecord) -> String {
    let name = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let Some(name) = name else {
        return "Unknown license".to_string();
    };

    let mut out = title_case(name);
    let class = record
        .current
        .as_ref()
        .and_then(|c| c.oper_class.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(class) = class {
        out.push_str(&format!(" ({class})"));
    }
    out
}

/// Capitalize the first letter of each word, lowercase the rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Low-level provider: does the real remote call.
#[async_trait::async_trait]
pub trait LicenseLookup: Send + Sync {
    async fn fetch(&self, call: &str) -> Result<LicenseRecord>;
    fn name(&self) -> &'static str;
}

/// Formatted license strings keyed by bare call (no SSID).
#[derive(Debug)]
pub struct LicenseCache {
    entries: TtlMap<String>,
}

impl LicenseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlMap::new(ttl),
        }
    }

    pub fn lookup(&self, call: &str) -> Option<String> {
        self.entries.get(call)
    }

    pub fn lookup_at(&self, call: &str, now: Instant) -> Option<String> {
        self.entries.get_at(call, now)
    }

    pub fn store(&self, call: &str, formatted: String) {
        self.entries.insert(call, formatted);
    }

    pub fn store_at(&self, call: &str, formatted: String, now: Instant) {
        self.entries.insert_at(call, formatted, now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache in front of a provider.
pub struct LicenseService {
    cache: LicenseCache,
    lookup: Arc<dyn LicenseLookup>,
}

impl LicenseService {
    pub fn new(cache: LicenseCache, lookup: Arc<dyn LicenseLookup>) -> Self {
        Self { cache, lookup }
    }

    pub fn cache(&self) -> &LicenseCache {
        &self.cache
    }

    /// Formatted license for `call`, or `None` when the lookup failed.
    pub async fn resolve(&self, call: &str) -> Option<String> {
        if let Some(hit) = self.cache.lookup(call) {
            return Some(hit);
        }

        match self.lookup.fetch(call).await {
            Ok(record) => {
                let formatted = format_license(&record);
                self.cache.store(call, formatted.clone());
                Some(formatted)
            }
            Err(e) => {
                counter!("license_lookup_errors_total").increment(1);
                tracing::warn!(
                    target: "license",
                    call,
                    provider = self.lookup.name(),
                    "license lookup failed: {e:#}"
                );
                None
            }
        }
    }
}
