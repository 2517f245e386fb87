//! Error taxonomy for the valuation engine
//!
//! Every fallible entry point returns a [`ValuationError`] so callers can
//! distinguish the kinds described in the driver contract instead of
//! matching on opaque strings.

use thiserror::Error;

/// The result type used throughout this crate.
pub type ValuationResult<T> = Result<T, ValuationError>;

/// Kinds of failure a valuation job can report to its caller.
#[derive(Debug, Error)]
pub enum ValuationError {
    /// Table sizes wrong, probabilities out of range, negative counts,
    /// non-finite parameters, or term above the configured maximum.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Shared buffer allocation failed, or a worker could not be launched.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The cancellation token was observed true.
    #[error("valuation cancelled")]
    Cancelled,

    /// The kernel produced NaN/Inf, or a worker terminated unexpectedly.
    #[error("execution error in scenario {scenario} policy {policy_id}: {detail}")]
    ExecutionError {
        scenario: u32,
        policy_id: u32,
        detail: String,
    },

    /// scenario_count or policy_count exceeds the hard limits implied by
    /// the 32-bit task encoding.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
}

impl From<std::io::Error> for ValuationError {
    fn from(err: std::io::Error) -> Self {
        ValuationError::InvalidInput(err.to_string())
    }
}

impl From<csv::Error> for ValuationError {
    fn from(err: csv::Error) -> Self {
        ValuationError::InvalidInput(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for ValuationError {
    fn from(err: std::num::ParseFloatError) -> Self {
        ValuationError::InvalidInput(err.to_string())
    }
}

impl From<std::num::ParseIntError> for ValuationError {
    fn from(err: std::num::ParseIntError) -> Self {
        ValuationError::InvalidInput(err.to_string())
    }
}
