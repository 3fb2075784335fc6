//! Error types for SAFE.

use thiserror::Error;

/// Unified error type for all SAFE operations.
#[derive(Error, Debug)]
pub enum SafeError {
    /// Configuration errors (unknown metric names, out-of-range thresholds)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation errors (shape mismatches, missing layout)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical errors (non-finite statistics where finite values are required)
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Too few top attributes to build a clustering hierarchy
    #[error("Insufficient attributes for domain clustering: {found} top attribute(s), need at least 2")]
    InsufficientAttributes { found: usize },

    /// Cooperative cancellation requested by the caller
    #[error("Enrichment cancelled after {completed} of {total} permutations")]
    Cancelled { completed: usize, total: usize },
}

impl SafeError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        SafeError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SafeError::Validation(message.into())
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        SafeError::Numerical(message.into())
    }

    /// True when the pipeline can degrade gracefully instead of aborting.
    ///
    /// Only the insufficient-attributes condition qualifies: the analysis is
    /// still meaningful with every node left in domain 0.
    pub fn is_degradable(&self) -> bool {
        matches!(self, SafeError::InsufficientAttributes { .. })
    }
}

/// Result type alias for SAFE operations.
pub type Result<T> = std::result::Result<T, SafeError>;
