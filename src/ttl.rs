//! # TTL Map
//! Thread-safe string-keyed map whose entries expire a fixed time after
//! insertion. Expiry is evaluated lazily on read against a monotonic clock;
//! `purge_expired` exists for memory hygiene only.
//!
//! The clock is `tokio::time::Instant`, so paused-time tests can move it.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

#[derive(Debug)]
pub struct TtlMap<V> {
    ttl: Duration,
    inner: Mutex<HashMap<String, Entry<V>>>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

impl<V: Clone> TtlMap<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key` at `now`. Expired entries are dropped on the way.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut map = self.inner.lock().expect("ttl map mutex poisoned");
        match map.get(key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Insert or replace; the expiry restarts from `now`.
    pub fn insert_at(&self, key: impl Into<String>, value: V, now: Instant) {
        let mut map = self.inner.lock().expect("ttl map mutex poisoned");
        map.insert(
            key.into(),
            Entry {
                value,
                inserted_at: now,
            },
        );
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_at(key, value, Instant::now())
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut map = self.inner.lock().expect("ttl map mutex poisoned");
        let before = map.len();
        let ttl = self.ttl;
        map.retain(|_, entry| !entry.is_expired(now, ttl));
        before - map.len()
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("ttl map mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
