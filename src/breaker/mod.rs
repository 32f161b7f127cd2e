//! Circuit breaker subsystem.
//!
//! # Data Flow
//! ```text
//! Caller observes a failure:
//!     → engine.rs Hystrix::counter().inc(1)
//!
//! evaluation.rs (self-rescheduling):
//!     Alive   → trip check     → maybe trigger_hystrix
//!     Hystrix → recovery check → maybe trigger_alive (+ reset bucket)
//!
//! counter::cleanup (fixed period):
//!     → evict stale buckets
//! ```
//!
//! # Design Decisions
//! - One breaker per monitored dependency
//! - The breaker only reports status; it does not gate or queue calls
//! - Missing checks fall back to built-in ones, so a breaker never runs
//!   without a check
//! - Loops stop on the shared shutdown signal

pub mod engine;
pub mod error;
pub mod evaluation;
pub mod state;

pub use engine::{BreakerTasks, CheckFn, Hystrix, TriggerFn, MIN_CHECK_INTERVAL};
pub use error::{BreakerError, BreakerResult};
pub use evaluation::StatusEvaluator;
pub use state::Status;
