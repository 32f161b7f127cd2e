//! Breaker status.
//!
//! # State Transitions
//! ```text
//! Alive → Hystrix: trip check returns true
//! Hystrix → Alive: recovery check returns true (current bucket is reset)
//! ```

use std::fmt;

/// Breaker status, stored as a `u8` in an atomic.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Tripped: the dependency is treated as failed.
    Hystrix = 1,
    /// Healthy.
    Alive = 2,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Hystrix => "hystrix",
            Status::Alive => "alive",
        }
    }
}

impl From<u8> for Status {
    fn from(val: u8) -> Self {
        match val {
            1 => Status::Hystrix,
            _ => Status::Alive,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
