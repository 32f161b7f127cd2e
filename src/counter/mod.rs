//! Failure counting subsystem.
//!
//! # Data Flow
//! ```text
//! Caller observes a failure:
//!     → Hystrix::counter() (current minute bucket)
//!     → store.rs (get-or-create bucket counter)
//!     → Counter::inc
//!
//! Periodic timer:
//!     → cleanup.rs (scan bucket keys)
//!     → key.rs (parse key back to a minute)
//!     → store.rs (evict buckets older than retention)
//! ```
//!
//! # Design Decisions
//! - One counter per minute bucket, never shared across buckets or breakers
//! - Counters are pluggable through `CounterFactory`
//! - Bucket creation is a single atomic get-or-insert

pub mod cleanup;
pub mod key;
pub mod store;

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub use cleanup::{CounterCleanup, RetentionPolicy};
pub use store::CounterStore;

/// A failure counter owned by a single time bucket.
///
/// Implementations must tolerate concurrent increments from many callers
/// and concurrent reads from the evaluation loop.
pub trait Counter: Send + Sync + fmt::Debug {
    /// Add `n` to the aggregate.
    fn inc(&self, n: i64);

    /// Subtract `n` from the aggregate.
    fn dec(&self, n: i64);

    /// Current aggregate.
    fn count(&self) -> i64;

    /// Reset the aggregate to zero.
    fn clear(&self);
}

/// Builds a fresh counter for a newly created bucket.
pub type CounterFactory = Arc<dyn Fn() -> Arc<dyn Counter> + Send + Sync>;

/// Lock-free counter backed by a single atomic.
#[derive(Debug, Default)]
pub struct StandardCounter {
    value: AtomicI64,
}

impl StandardCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for StandardCounter {
    fn inc(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    fn dec(&self, n: i64) {
        self.value.fetch_sub(n, Ordering::Relaxed);
    }

    fn count(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Factory producing `StandardCounter`s.
pub fn standard_factory() -> CounterFactory {
    Arc::new(|| Arc::new(StandardCounter::new()) as Arc<dyn Counter>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_counter() {
        let counter = StandardCounter::new();
        assert_eq!(counter.count(), 0);

        counter.inc(3);
        counter.inc(1);
        counter.dec(2);
        assert_eq!(counter.count(), 2);

        counter.clear();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = Arc::new(StandardCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc(1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.count(), 8000);
    }
}
