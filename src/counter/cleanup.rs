//! Counter cleanup loop.
//!
//! # Responsibilities
//! - Periodically evict buckets older than the retention window
//! - Evict buckets whose keys fail to parse
//! - Report live/evicted bucket counts

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::time;

use crate::config::BreakerConfig;
use crate::counter::store::CounterStore;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Retention window and sweep period, adjustable while the loop runs.
#[derive(Debug)]
pub struct RetentionPolicy {
    window_secs: AtomicU64,
    interval_secs: AtomicU64,
}

impl RetentionPolicy {
    pub fn new(window: Duration, interval: Duration) -> Self {
        Self {
            window_secs: AtomicU64::new(window.as_secs()),
            interval_secs: AtomicU64::new(interval.as_secs()),
        }
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(config.retention(), config.cleanup_interval())
    }

    /// Maximum bucket age kept by a sweep.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.load(Ordering::Relaxed))
    }

    /// Delay between sweeps.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::Relaxed))
    }

    pub fn set_window(&self, window: Duration) {
        self.window_secs.store(window.as_secs(), Ordering::Relaxed);
    }

    pub fn set_interval(&self, interval: Duration) {
        self.interval_secs.store(interval.as_secs(), Ordering::Relaxed);
    }
}

/// Background sweeper for one breaker's counter store.
pub struct CounterCleanup {
    /// The owning breaker's id cell, so renames show up in logs and labels.
    breaker_id: Arc<ArcSwap<String>>,
    store: Arc<CounterStore>,
    policy: Arc<RetentionPolicy>,
}

impl CounterCleanup {
    pub fn new(
        breaker_id: Arc<ArcSwap<String>>,
        store: Arc<CounterStore>,
        policy: Arc<RetentionPolicy>,
    ) -> Self {
        Self {
            breaker_id,
            store,
            policy,
        }
    }

    pub fn breaker_id(&self) -> String {
        self.breaker_id.load().to_string()
    }

    /// Run a single sweep against the current wall clock.
    pub fn sweep(&self) -> usize {
        let evicted = self.store.purge_stale(Utc::now(), self.policy.window());
        let live = self.store.len();
        let breaker_id = self.breaker_id();

        if evicted > 0 {
            tracing::debug!(
                breaker = %breaker_id,
                evicted,
                live,
                "Counter buckets evicted"
            );
        }

        metrics::record_buckets_evicted(&breaker_id, evicted);
        metrics::record_live_buckets(&breaker_id, live);
        evicted
    }

    /// Sweep immediately, then every `policy.interval()` until shutdown.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            breaker = %self.breaker_id(),
            interval_secs = self.policy.interval().as_secs(),
            retention_secs = self.policy.window().as_secs(),
            "Counter cleanup starting"
        );

        loop {
            self.sweep();

            tokio::select! {
                _ = time::sleep(self.policy.interval()) => {}
                _ = shutdown.recv() => {
                    tracing::info!(breaker = %self.breaker_id(), "Counter cleanup received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::key;
    use crate::lifecycle::Shutdown;
    use chrono::TimeDelta;

    fn id(name: &str) -> Arc<ArcSwap<String>> {
        Arc::new(ArcSwap::from_pointee(name.to_string()))
    }

    #[test]
    fn test_sweep_keeps_current_bucket() {
        let store = Arc::new(CounterStore::new());
        let policy = Arc::new(RetentionPolicy::new(
            Duration::from_secs(30 * 60),
            Duration::from_secs(300),
        ));

        store.current().inc(1);
        store.get_or_create(&key::bucket_key(Utc::now() - TimeDelta::hours(2)));
        store.get_or_create("bogus");

        let cleanup = CounterCleanup::new(id("test"), store.clone(), policy);
        assert_eq!(cleanup.sweep(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_follows_breaker_rename() {
        let breaker_id = id("orders");
        let cleanup = CounterCleanup::new(
            breaker_id.clone(),
            Arc::new(CounterStore::new()),
            Arc::new(RetentionPolicy::from_config(&BreakerConfig::default())),
        );
        assert_eq!(cleanup.breaker_id(), "orders");

        breaker_id.store(Arc::new("orders-replica".to_string()));
        assert_eq!(cleanup.breaker_id(), "orders-replica");
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_exits_when_triggered_before_start() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let cleanup = CounterCleanup::new(
            id("test"),
            Arc::new(CounterStore::new()),
            Arc::new(RetentionPolicy::from_config(&BreakerConfig::default())),
        );
        let handle = tokio::spawn(cleanup.run(shutdown.subscribe()));
        let joined = time::timeout(Duration::from_secs(1), handle).await;
        assert!(joined.is_ok());
    }

    #[test]
    fn test_policy_updates() {
        let policy = RetentionPolicy::from_config(&BreakerConfig::default());
        assert_eq!(policy.window(), Duration::from_secs(30 * 60));
        assert_eq!(policy.interval(), Duration::from_secs(300));

        policy.set_window(Duration::from_secs(60));
        policy.set_interval(Duration::from_secs(5));
        assert_eq!(policy.window(), Duration::from_secs(60));
        assert_eq!(policy.interval(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_exits_on_shutdown() {
        let store = Arc::new(CounterStore::new());
        store.get_or_create("bogus");
        let policy = Arc::new(RetentionPolicy::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        ));

        let shutdown = Shutdown::new();
        let cleanup = CounterCleanup::new(id("test"), store.clone(), policy);
        let handle = tokio::spawn(cleanup.run(shutdown.subscribe()));

        time::sleep(Duration::from_millis(10)).await;
        assert!(store.is_empty());

        shutdown.trigger();
        handle.await.unwrap();
    }
}
