//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hystrix::{BreakerConfig, Hystrix};

#[allow(dead_code)]
/// Tuning with short, distinct intervals so tick timing is easy to follow.
pub fn fast_config(max_failed_number: i64) -> BreakerConfig {
    BreakerConfig {
        check_hystrix_interval_secs: 1,
        check_alive_interval_secs: 2,
        cleanup_interval_secs: 60,
        max_failed_number,
        retention_minutes: 30,
        recovery_probe_interval_secs: 10,
    }
}

/// Callback counters attached to a breaker.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct TransitionLog {
    pub tripped: Arc<AtomicUsize>,
    pub recovered: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl TransitionLog {
    pub fn attach<T: Send + Sync + 'static>(breaker: &Hystrix<T>) -> Self {
        let log = Self::default();

        let tripped = log.tripped.clone();
        breaker.register_on_trigger_hystrix(Arc::new(move |_: &Hystrix<T>| {
            tripped.fetch_add(1, Ordering::SeqCst);
        }));

        let recovered = log.recovered.clone();
        breaker.register_on_trigger_alive(Arc::new(move |_: &Hystrix<T>| {
            recovered.fetch_add(1, Ordering::SeqCst);
        }));

        log
    }

    pub fn tripped(&self) -> usize {
        self.tripped.load(Ordering::SeqCst)
    }

    pub fn recovered(&self) -> usize {
        self.recovered.load(Ordering::SeqCst)
    }
}

/// Let spawned loops run their pending ticks under paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
