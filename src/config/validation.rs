//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject zero intervals and non-positive thresholds
//! - Cap the retention window
//! - Reject empty or duplicate breaker ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before a config is accepted, at load and at reload

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BreakerConfig, HystrixConfig, MAX_RETENTION_MINUTES};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("max_failed_number must be positive, got {0}")]
    NonPositiveThreshold(i64),

    #[error("breaker #{0} has an empty id")]
    EmptyId(usize),

    #[error("duplicate breaker id '{0}'")]
    DuplicateId(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Render a list of errors on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate the tuning of one breaker.
pub fn validate_breaker(config: &BreakerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let intervals = [
        ("check_hystrix_interval_secs", config.check_hystrix_interval_secs),
        ("check_alive_interval_secs", config.check_alive_interval_secs),
        ("cleanup_interval_secs", config.cleanup_interval_secs),
        ("retention_minutes", config.retention_minutes),
        ("recovery_probe_interval_secs", config.recovery_probe_interval_secs),
    ];
    for (field, value) in intervals {
        if value == 0 {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    if config.retention_minutes > MAX_RETENTION_MINUTES {
        errors.push(ValidationError::TooLarge {
            field: "retention_minutes",
            value: config.retention_minutes,
            max: MAX_RETENTION_MINUTES,
        });
    }

    if config.max_failed_number <= 0 {
        errors.push(ValidationError::NonPositiveThreshold(config.max_failed_number));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a whole daemon configuration.
pub fn validate_config(config: &HystrixConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in config.breakers.iter().enumerate() {
        if entry.id.trim().is_empty() {
            errors.push(ValidationError::EmptyId(index));
        } else if !seen.insert(entry.id.as_str()) {
            errors.push(ValidationError::DuplicateId(entry.id.clone()));
        }

        if let Err(mut breaker_errors) = validate_breaker(&entry.settings) {
            errors.append(&mut breaker_errors);
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BreakerEntry;

    fn entry(id: &str) -> BreakerEntry {
        BreakerEntry {
            id: id.to_string(),
            description: None,
            settings: BreakerConfig::default(),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate_breaker(&BreakerConfig::default()).is_ok());
        assert!(validate_config(&HystrixConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = BreakerConfig {
            check_hystrix_interval_secs: 0,
            retention_minutes: 0,
            max_failed_number: -1,
            ..BreakerConfig::default()
        };

        let errors = validate_breaker(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroValue {
            field: "check_hystrix_interval_secs"
        }));
        assert!(errors.contains(&ValidationError::NonPositiveThreshold(-1)));
    }

    #[test]
    fn test_huge_retention_rejected() {
        let raw = "[[breakers]]\nid = \"a\"\nretention_minutes = 9000000000000000000\n";
        let err = crate::config::loader::parse_config(raw).unwrap_err();
        assert!(err.to_string().contains("retention_minutes must be at most 10080"));

        let config = BreakerConfig {
            retention_minutes: 9_000_000_000_000_000_000,
            ..BreakerConfig::default()
        };
        let errors = validate_breaker(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::TooLarge {
                field: "retention_minutes",
                value: 9_000_000_000_000_000_000,
                max: MAX_RETENTION_MINUTES,
            }]
        );

        let result = std::panic::catch_unwind(|| {
            crate::breaker::Hystrix::<()>::new(&config, None, None)
        });
        assert!(matches!(
            result,
            Ok(Err(crate::breaker::BreakerError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_ids() {
        let mut config = HystrixConfig::default();
        config.breakers = vec![entry("a"), entry(""), entry("a")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyId(1),
                ValidationError::DuplicateId("a".into()),
            ]
        );
    }

    #[test]
    fn test_metrics_address() {
        let mut config = HystrixConfig::default();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(join_errors(&errors), "invalid metrics address 'nowhere'");
    }
}
