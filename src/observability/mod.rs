//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and loops produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every log event carries the breaker id as a field
//! - Metrics are cheap and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
