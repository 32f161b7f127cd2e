//! Self-monitoring circuit breakers.
//!
//! A [`Hystrix`] breaker counts failures in minute buckets, trips when the
//! current bucket exceeds a threshold and probes for recovery on its own.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hystrix::{BreakerConfig, Hystrix, Shutdown};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker: Hystrix = Hystrix::new(&BreakerConfig::default(), None, None)?;
//! breaker.set_id("orders-db");
//! breaker.register_on_trigger_hystrix(Arc::new(|h: &Hystrix| {
//!     tracing::warn!(breaker = %h.id(), "tripped");
//! }));
//!
//! let shutdown = Shutdown::new();
//! let tasks = breaker.start(&shutdown);
//!
//! // on every observed failure
//! breaker.counter().inc(1);
//! if breaker.is_hystrix() {
//!     // skip the dependency
//! }
//!
//! shutdown.trigger();
//! tasks.join().await;
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod config;
pub mod counter;
pub mod lifecycle;
pub mod observability;

pub use breaker::{BreakerError, CheckFn, Hystrix, Status, TriggerFn};
pub use config::{BreakerConfig, HystrixConfig};
pub use counter::{Counter, CounterFactory, StandardCounter};
pub use lifecycle::Shutdown;
