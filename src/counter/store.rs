//! Time-bucketed counter store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::counter::key;
use crate::counter::{standard_factory, Counter, CounterFactory};

/// Concurrent map of bucket key -> counter.
pub struct CounterStore {
    buckets: DashMap<String, Arc<dyn Counter>>,
    factory: CounterFactory,
}

impl CounterStore {
    /// Create an empty store producing `StandardCounter`s.
    pub fn new() -> Self {
        Self::with_factory(standard_factory())
    }

    /// Create an empty store producing counters from `factory`.
    pub fn with_factory(factory: CounterFactory) -> Self {
        Self {
            buckets: DashMap::new(),
            factory,
        }
    }

    /// Counter of the current minute, created if absent.
    pub fn current(&self) -> Arc<dyn Counter> {
        self.get_or_create(&key::current_key())
    }

    /// Counter for `key`, created if absent.
    pub fn get_or_create(&self, key: &str) -> Arc<dyn Counter> {
        if let Some(existing) = self.buckets.get(key) {
            return existing.value().clone();
        }
        // entry() holds the shard lock, so racing callers share one counter
        self.buckets
            .entry(key.to_owned())
            .or_insert_with(|| (self.factory)())
            .value()
            .clone()
    }

    /// Counter for `key` without creating it.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Counter>> {
        self.buckets.get(key).map(|r| r.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Snapshot of all bucket keys.
    pub fn keys(&self) -> Vec<String> {
        self.buckets.iter().map(|r| r.key().clone()).collect()
    }

    /// Evict buckets older than `retention` relative to `now`, plus any
    /// bucket whose key does not parse. Returns the number evicted.
    ///
    /// Keys are collected first and removed after the scan so the map is
    /// never mutated while being iterated.
    pub fn purge_stale(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let now = key::truncate_to_minute(now);
        let retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);

        let stale: Vec<String> = self
            .buckets
            .iter()
            .filter(|r| match key::parse_key(r.key()) {
                Some(minute) => now.signed_duration_since(minute) > retention,
                None => true,
            })
            .map(|r| r.key().clone())
            .collect();

        for k in &stale {
            tracing::debug!(key = %k, "Evicting counter bucket");
            self.buckets.remove(k);
        }

        stale.len()
    }
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterStore")
            .field("buckets", &self.buckets.len())
            .finish()
    }
}
