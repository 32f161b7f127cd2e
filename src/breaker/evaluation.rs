//! Status evaluation loop.
//!
//! Each tick runs the check that matches the current status and picks the
//! next delay from the outcome:
//!
//! ```text
//! Hystrix, recovery check true  → Alive,   next in check_hystrix_interval
//! Hystrix, recovery check false → Hystrix, next in check_alive_interval
//! Alive,   trip check true      → Hystrix, next in check_alive_interval
//! Alive,   trip check false     → Alive,   next in check_hystrix_interval
//! ```
//!
//! Intervals are read after each tick, so changes apply from the next
//! reschedule. Transition callbacks run inline; a slow callback delays this
//! breaker's next tick only.

use std::time::Duration;

use tokio::time;

use crate::breaker::engine::Hystrix;
use crate::breaker::state::Status;
use crate::lifecycle::ShutdownSignal;

/// Self-rescheduling evaluator for one breaker.
pub struct StatusEvaluator<T> {
    breaker: Hystrix<T>,
}

impl<T: Send + Sync + 'static> StatusEvaluator<T> {
    pub fn new(breaker: Hystrix<T>) -> Self {
        Self { breaker }
    }

    /// Evaluate once and return the delay before the next tick.
    pub fn tick(&self) -> Duration {
        let breaker = &self.breaker;

        match breaker.status() {
            Status::Hystrix => {
                if breaker.check_alive() {
                    breaker.trigger_alive();
                    breaker.check_hystrix_interval()
                } else {
                    breaker.check_alive_interval()
                }
            }
            Status::Alive => {
                if breaker.check_hystrix() {
                    breaker.trigger_hystrix();
                    breaker.check_alive_interval()
                } else {
                    breaker.check_hystrix_interval()
                }
            }
        }
    }

    /// Tick immediately, then after each chosen delay until shutdown.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(breaker = %self.breaker.id(), "Status evaluation starting");

        loop {
            let delay = self.tick();
            tracing::trace!(
                breaker = %self.breaker.id(),
                status = %self.breaker.status(),
                delay_ms = delay.as_millis() as u64,
                "Next status evaluation scheduled"
            );

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!(breaker = %self.breaker.id(), "Status evaluation received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
