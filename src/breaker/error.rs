//! Breaker error definitions.

use thiserror::Error;

use crate::config::validation::{join_errors, ValidationError};

/// Errors raised while building or reconfiguring a breaker.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The supplied tuning failed validation.
    #[error("invalid breaker configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),
}

/// Result type for breaker operations.
pub type BreakerResult<T> = Result<T, BreakerError>;
