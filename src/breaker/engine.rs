//! Circuit breaker engine.
//!
//! # Responsibilities
//! - Own status, last transition time, thresholds and check intervals
//! - Hold replaceable trip/recovery checks and transition callbacks
//! - Hand out the current minute's failure counter
//! - Spawn the evaluation and cleanup loops
//!
//! # Concurrency
//! Every field is independently readable and writable from any thread.
//! Status is an atomic, checks and callbacks are swapped atomically and the
//! next evaluation tick sees the latest value. Reads racing a transition see
//! either the old or the new status.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::breaker::error::{BreakerError, BreakerResult};
use crate::breaker::evaluation::StatusEvaluator;
use crate::breaker::state::Status;
use crate::config::validation::validate_breaker;
use crate::config::BreakerConfig;
use crate::counter::{Counter, CounterCleanup, CounterFactory, CounterStore, RetentionPolicy};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Zero-argument check, e.g. "should we trip now?".
pub type CheckFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Callback invoked with the breaker on a transition.
pub type TriggerFn<T> = Arc<dyn Fn(&Hystrix<T>) + Send + Sync>;

/// Shortest evaluation delay the loop will schedule.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

struct Inner<T> {
    /// Shared with the cleanup loop so its labels follow `set_id`.
    id: Arc<ArcSwap<String>>,
    status: AtomicU8,

    /// Reference point for `last_change_nanos`.
    created: Instant,
    last_change_nanos: AtomicU64,

    check_hystrix_interval_ms: AtomicU64,
    check_alive_interval_ms: AtomicU64,
    recovery_probe_interval_ms: AtomicU64,
    max_failed_number: AtomicI64,

    /// `None` selects the built-in check.
    check_alive: ArcSwapOption<CheckFn>,
    check_hystrix: ArcSwapOption<CheckFn>,

    on_trigger_alive: ArcSwapOption<TriggerFn<T>>,
    on_trigger_hystrix: ArcSwapOption<TriggerFn<T>>,

    extended_data: ArcSwapOption<T>,

    counters: Arc<CounterStore>,
    retention: Arc<RetentionPolicy>,
}

/// A self-monitoring circuit breaker for one dependency.
///
/// Cloning is cheap and every clone refers to the same breaker. `T` is the
/// type of the caller's extended data, which the engine never inspects.
pub struct Hystrix<T = ()> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Hystrix<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Join handles of a started breaker's background loops.
#[derive(Debug)]
pub struct BreakerTasks {
    pub evaluation: JoinHandle<()>,
    pub cleanup: JoinHandle<()>,
}

impl BreakerTasks {
    /// Wait for both loops to exit (after shutdown is triggered).
    pub async fn join(self) {
        let (evaluation, cleanup) = tokio::join!(self.evaluation, self.cleanup);
        if let Err(e) = evaluation {
            tracing::error!(error = %e, "Status evaluation task failed");
        }
        if let Err(e) = cleanup {
            tracing::error!(error = %e, "Counter cleanup task failed");
        }
    }
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<T: Send + Sync + 'static> Hystrix<T> {
    /// Create a breaker. A `None` check is replaced by the built-in one.
    pub fn new(
        config: &BreakerConfig,
        check_alive: Option<CheckFn>,
        check_hystrix: Option<CheckFn>,
    ) -> BreakerResult<Self> {
        Self::with_store(config, check_alive, check_hystrix, CounterStore::new())
    }

    /// Create a breaker whose buckets use counters built by `factory`.
    pub fn with_counter_factory(
        config: &BreakerConfig,
        check_alive: Option<CheckFn>,
        check_hystrix: Option<CheckFn>,
        factory: CounterFactory,
    ) -> BreakerResult<Self> {
        Self::with_store(
            config,
            check_alive,
            check_hystrix,
            CounterStore::with_factory(factory),
        )
    }

    fn with_store(
        config: &BreakerConfig,
        check_alive: Option<CheckFn>,
        check_hystrix: Option<CheckFn>,
        store: CounterStore,
    ) -> BreakerResult<Self> {
        validate_breaker(config).map_err(BreakerError::InvalidConfig)?;

        Ok(Self {
            inner: Arc::new(Inner {
                id: Arc::new(ArcSwap::from_pointee(String::new())),
                status: AtomicU8::new(Status::Alive as u8),
                created: Instant::now(),
                last_change_nanos: AtomicU64::new(0),
                check_hystrix_interval_ms: AtomicU64::new(as_millis(config.check_hystrix_interval())),
                check_alive_interval_ms: AtomicU64::new(as_millis(config.check_alive_interval())),
                recovery_probe_interval_ms: AtomicU64::new(as_millis(
                    config.recovery_probe_interval(),
                )),
                max_failed_number: AtomicI64::new(config.max_failed_number),
                check_alive: ArcSwapOption::new(check_alive.map(Arc::new)),
                check_hystrix: ArcSwapOption::new(check_hystrix.map(Arc::new)),
                on_trigger_alive: ArcSwapOption::empty(),
                on_trigger_hystrix: ArcSwapOption::empty(),
                extended_data: ArcSwapOption::empty(),
                counters: Arc::new(store),
                retention: Arc::new(RetentionPolicy::from_config(config)),
            }),
        })
    }

    /// Spawn the status evaluation loop and the counter cleanup loop.
    ///
    /// Both loops run their first pass immediately and exit once `shutdown`
    /// is triggered; if it already was, they exit after that first pass.
    /// Must be called from within a tokio runtime, once.
    pub fn start(&self, shutdown: &Shutdown) -> BreakerTasks {
        tracing::info!(
            breaker = %self.id(),
            max_failed_number = self.max_failed_number(),
            "Starting breaker"
        );
        metrics::record_status(&self.id(), self.status());

        let evaluation = tokio::spawn(StatusEvaluator::new(self.clone()).run(shutdown.subscribe()));
        let cleanup = tokio::spawn(
            CounterCleanup::new(
                self.inner.id.clone(),
                self.inner.counters.clone(),
                self.inner.retention.clone(),
            )
            .run(shutdown.subscribe()),
        );

        BreakerTasks {
            evaluation,
            cleanup,
        }
    }

    // --- Checks and callbacks ---

    /// Replace the recovery check used while tripped.
    pub fn register_alive_check(&self, check: CheckFn) {
        self.inner.check_alive.store(Some(Arc::new(check)));
    }

    /// Replace the trip check used while Alive.
    pub fn register_hystrix_check(&self, check: CheckFn) {
        self.inner.check_hystrix.store(Some(Arc::new(check)));
    }

    pub fn register_on_trigger_alive(&self, callback: TriggerFn<T>) {
        self.inner.on_trigger_alive.store(Some(Arc::new(callback)));
    }

    pub fn register_on_trigger_hystrix(&self, callback: TriggerFn<T>) {
        self.inner.on_trigger_hystrix.store(Some(Arc::new(callback)));
    }

    /// Built-in trip check: the current minute's failures exceed the
    /// threshold. Earlier buckets are not summed.
    pub fn default_hystrix_check(&self) -> bool {
        self.counter().count() > self.max_failed_number()
    }

    /// Built-in recovery check: tripped for longer than the recovery-probe
    /// interval.
    pub fn default_alive_check(&self) -> bool {
        self.last_change().elapsed() > self.recovery_probe_interval()
    }

    /// Run the active trip check. A panicking check counts as `false`.
    pub fn check_hystrix(&self) -> bool {
        let custom = self.inner.check_hystrix.load_full();
        self.guarded("check_hystrix", || match custom {
            Some(check) => check(),
            None => self.default_hystrix_check(),
        })
        .unwrap_or(false)
    }

    /// Run the active recovery check. A panicking check counts as `false`.
    pub fn check_alive(&self) -> bool {
        let custom = self.inner.check_alive.load_full();
        self.guarded("check_alive", || match custom {
            Some(check) => check(),
            None => self.default_alive_check(),
        })
        .unwrap_or(false)
    }

    fn guarded<R>(&self, hook: &'static str, f: impl FnOnce() -> R) -> Option<R> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(_) => {
                let id = self.id();
                tracing::error!(breaker = %id, hook, "Breaker hook panicked");
                metrics::record_hook_panic(&id, hook);
                None
            }
        }
    }

    // --- Transitions ---

    /// Switch to Hystrix and run `on_trigger_hystrix`.
    ///
    /// The callback runs on every call, even if already tripped; the
    /// transition time only moves when the status actually changes.
    pub fn trigger_hystrix(&self) {
        if self.transition(Status::Hystrix) {
            tracing::warn!(breaker = %self.id(), "Breaker tripped");
        }
        if let Some(callback) = self.inner.on_trigger_hystrix.load_full() {
            self.guarded("on_trigger_hystrix", || callback(self));
        }
    }

    /// Switch to Alive, run `on_trigger_alive`, then reset the current
    /// minute's counter so a fresh window starts.
    pub fn trigger_alive(&self) {
        if self.transition(Status::Alive) {
            tracing::info!(breaker = %self.id(), "Breaker recovered");
        }
        if let Some(callback) = self.inner.on_trigger_alive.load_full() {
            self.guarded("on_trigger_alive", || callback(self));
        }
        self.counter().clear();
    }

    /// Returns true if the status changed.
    fn transition(&self, to: Status) -> bool {
        let prev = Status::from(self.inner.status.swap(to as u8, Ordering::AcqRel));
        if prev == to {
            return false;
        }

        let nanos = u64::try_from(self.inner.created.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.inner.last_change_nanos.store(nanos, Ordering::Release);

        let id = self.id();
        metrics::record_transition(&id, to);
        metrics::record_status(&id, to);
        true
    }

    // --- Reads ---

    pub fn id(&self) -> String {
        self.inner.id.load().to_string()
    }

    pub fn status(&self) -> Status {
        Status::from(self.inner.status.load(Ordering::Acquire))
    }

    pub fn is_hystrix(&self) -> bool {
        self.status() == Status::Hystrix
    }

    /// Instant of the most recent status change (construction time if none).
    pub fn last_change(&self) -> Instant {
        let nanos = self.inner.last_change_nanos.load(Ordering::Acquire);
        self.inner.created + Duration::from_nanos(nanos)
    }

    pub fn extended_data(&self) -> Option<Arc<T>> {
        self.inner.extended_data.load_full()
    }

    /// Failure counter of the current minute, created if absent.
    pub fn counter(&self) -> Arc<dyn Counter> {
        self.inner.counters.current()
    }

    /// The underlying bucket store.
    pub fn counters(&self) -> &CounterStore {
        &self.inner.counters
    }

    pub fn max_failed_number(&self) -> i64 {
        self.inner.max_failed_number.load(Ordering::Relaxed)
    }

    pub fn check_hystrix_interval(&self) -> Duration {
        Duration::from_millis(self.inner.check_hystrix_interval_ms.load(Ordering::Relaxed))
    }

    pub fn check_alive_interval(&self) -> Duration {
        Duration::from_millis(self.inner.check_alive_interval_ms.load(Ordering::Relaxed))
    }

    pub fn recovery_probe_interval(&self) -> Duration {
        Duration::from_millis(self.inner.recovery_probe_interval_ms.load(Ordering::Relaxed))
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.inner.retention
    }

    // --- Writes ---

    pub fn set_id(&self, id: impl Into<String>) {
        self.inner.id.store(Arc::new(id.into()));
    }

    pub fn set_extended_data(&self, data: T) {
        self.inner.extended_data.store(Some(Arc::new(data)));
    }

    pub fn clear_extended_data(&self) {
        self.inner.extended_data.store(None);
    }

    /// Set both evaluation delays. Values below `MIN_CHECK_INTERVAL` are
    /// raised to it.
    pub fn set_check_interval(&self, hystrix_interval: Duration, alive_interval: Duration) {
        self.inner.check_hystrix_interval_ms.store(
            as_millis(hystrix_interval.max(MIN_CHECK_INTERVAL)),
            Ordering::Relaxed,
        );
        self.inner.check_alive_interval_ms.store(
            as_millis(alive_interval.max(MIN_CHECK_INTERVAL)),
            Ordering::Relaxed,
        );
    }

    pub fn set_max_failed_number(&self, number: i64) {
        self.inner.max_failed_number.store(number, Ordering::Relaxed);
    }

    pub fn set_recovery_probe_interval(&self, interval: Duration) {
        self.inner
            .recovery_probe_interval_ms
            .store(as_millis(interval), Ordering::Relaxed);
    }

    /// Validate and apply new tuning to a running breaker.
    pub fn apply_config(&self, config: &BreakerConfig) -> BreakerResult<()> {
        validate_breaker(config).map_err(BreakerError::InvalidConfig)?;

        self.set_check_interval(config.check_hystrix_interval(), config.check_alive_interval());
        self.set_max_failed_number(config.max_failed_number);
        self.set_recovery_probe_interval(config.recovery_probe_interval());
        self.inner.retention.set_window(config.retention());
        self.inner.retention.set_interval(config.cleanup_interval());

        tracing::info!(
            breaker = %self.id(),
            max_failed_number = config.max_failed_number,
            check_hystrix_interval_secs = config.check_hystrix_interval_secs,
            check_alive_interval_secs = config.check_alive_interval_secs,
            "Breaker configuration updated"
        );
        Ok(())
    }
}

impl<T> fmt::Debug for Hystrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hystrix")
            .field("id", &self.inner.id.load().as_str())
            .field("status", &Status::from(self.inner.status.load(Ordering::Relaxed)))
            .field("max_failed_number", &self.inner.max_failed_number.load(Ordering::Relaxed))
            .field("buckets", &self.inner.counters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn breaker() -> Hystrix {
        Hystrix::new(&BreakerConfig::default(), None, None).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let b = breaker();
        assert_eq!(b.status(), Status::Alive);
        assert!(!b.is_hystrix());
        assert_eq!(b.id(), "");
        assert!(b.extended_data().is_none());
        assert_eq!(b.max_failed_number(), 100);
        assert_eq!(b.check_hystrix_interval(), Duration::from_secs(10));
        assert_eq!(b.check_alive_interval(), Duration::from_secs(60));
        assert_eq!(b.recovery_probe_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BreakerConfig {
            max_failed_number: 0,
            ..BreakerConfig::default()
        };
        let err = Hystrix::<()>::new(&config, None, None).unwrap_err();
        assert!(err.to_string().contains("max_failed_number must be positive"));
    }

    #[test]
    fn test_default_trip_threshold() {
        let b = breaker();
        b.set_max_failed_number(5);

        b.counter().inc(5);
        assert!(!b.default_hystrix_check());

        b.counter().inc(1);
        assert!(b.default_hystrix_check());
        assert!(b.check_hystrix());
    }

    #[test]
    fn test_custom_checks_replace_defaults() {
        let b = breaker();
        b.register_hystrix_check(Arc::new(|| true));
        b.register_alive_check(Arc::new(|| false));
        assert!(b.check_hystrix());
        assert!(!b.check_alive());
    }

    #[test]
    fn test_custom_checks_at_construction() {
        let b: Hystrix = Hystrix::new(
            &BreakerConfig::default(),
            Some(Arc::new(|| true)),
            None,
        )
        .unwrap();
        assert!(b.check_alive());
        assert!(!b.check_hystrix());
    }

    #[test]
    fn test_panicking_check_is_false() {
        let b = breaker();
        b.register_hystrix_check(Arc::new(|| -> bool { panic!("check exploded") }));
        assert!(!b.check_hystrix());
    }

    #[test]
    fn test_callbacks_fire_every_trigger() {
        let b = breaker();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        b.register_on_trigger_hystrix(Arc::new(move |h: &Hystrix| {
            assert!(h.is_hystrix());
            f.fetch_add(1, Ordering::SeqCst);
        }));

        b.trigger_hystrix();
        let first_change = b.last_change();
        b.trigger_hystrix();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(b.last_change(), first_change);
    }

    #[test]
    fn test_panicking_callback_still_transitions() {
        let b = breaker();
        b.register_on_trigger_hystrix(Arc::new(|_: &Hystrix| panic!("callback exploded")));
        b.trigger_hystrix();
        assert!(b.is_hystrix());
    }

    #[test]
    fn test_trigger_alive_clears_current_bucket() {
        let b = breaker();
        b.counter().inc(42);
        b.trigger_hystrix();
        b.trigger_alive();
        assert_eq!(b.status(), Status::Alive);
        assert_eq!(b.counter().count(), 0);
    }

    #[test]
    fn test_extended_data_reaches_callback() {
        let b: Hystrix<String> = Hystrix::new(&BreakerConfig::default(), None, None).unwrap();
        b.set_id("orders");
        b.set_extended_data("orders-db primary".to_string());

        let seen = Arc::new(ArcSwapOption::<String>::empty());
        let s = seen.clone();
        b.register_on_trigger_alive(Arc::new(move |h: &Hystrix<String>| {
            s.store(h.extended_data());
        }));

        b.trigger_alive();
        assert_eq!(b.id(), "orders");
        assert_eq!(seen.load_full().as_deref(), Some(&"orders-db primary".to_string()));
    }

    #[test]
    fn test_clear_extended_data() {
        let b: Hystrix<String> = Hystrix::new(&BreakerConfig::default(), None, None).unwrap();
        b.set_extended_data("replica".to_string());
        b.clear_extended_data();
        assert!(b.extended_data().is_none());
    }

    #[test]
    fn test_zero_check_interval_raised_to_minimum() {
        let b = breaker();
        b.set_check_interval(Duration::ZERO, Duration::from_micros(10));
        assert_eq!(b.check_hystrix_interval(), MIN_CHECK_INTERVAL);
        assert_eq!(b.check_alive_interval(), MIN_CHECK_INTERVAL);

        b.set_check_interval(Duration::from_secs(3), Duration::from_secs(4));
        assert_eq!(b.check_hystrix_interval(), Duration::from_secs(3));
        assert_eq!(b.check_alive_interval(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_recovery_after_probe_interval() {
        let b = breaker();
        b.trigger_hystrix();
        assert!(!b.default_alive_check());

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(!b.default_alive_check());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.default_alive_check());
    }

    #[test]
    fn test_apply_config() {
        let b = breaker();
        let config = BreakerConfig {
            check_hystrix_interval_secs: 1,
            check_alive_interval_secs: 2,
            max_failed_number: 7,
            retention_minutes: 5,
            recovery_probe_interval_secs: 30,
            cleanup_interval_secs: 20,
        };

        b.apply_config(&config).unwrap();
        assert_eq!(b.check_hystrix_interval(), Duration::from_secs(1));
        assert_eq!(b.check_alive_interval(), Duration::from_secs(2));
        assert_eq!(b.max_failed_number(), 7);
        assert_eq!(b.recovery_probe_interval(), Duration::from_secs(30));
        assert_eq!(b.retention().window(), Duration::from_secs(300));
        assert_eq!(b.retention().interval(), Duration::from_secs(20));

        let bad = BreakerConfig {
            check_alive_interval_secs: 0,
            ..config
        };
        assert!(b.apply_config(&bad).is_err());
        assert_eq!(b.check_alive_interval(), Duration::from_secs(2));
    }
}
