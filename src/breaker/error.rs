//! Breaker error types

use std::fmt;
use std::time::Duration;

/// Why a guarded call did not produce a value.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// Rejected without invoking the call
    Open,

    /// The call exceeded the breaker's timeout
    Timeout(Duration),

    /// The call itself returned an error
    Failed(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit breaker is open"),
            BreakerError::Timeout(limit) => {
                write!(f, "call timed out after {}ms", limit.as_millis())
            }
            BreakerError::Failed(e) => e.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BreakerError::Failed(e) => Some(e),
            _ => None,
        }
    }
}
