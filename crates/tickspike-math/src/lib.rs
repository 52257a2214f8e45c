//! Spike train statistics and coincidence measures
//!
//! This crate holds the numeric pieces shared by the tickspike runtime and by
//! offline analysis code:
//!
//! - [`stats`]: running (streaming) mean/variance accumulators and the batch
//!   helpers they are checked against
//! - [`coincidence`]: greedy coincidence matching and the gamma factor
//!
//! Both the online `CoincidenceCounter` of the runtime and the offline
//! [`coincidence::gamma_factor`] reduce to [`coincidence::gamma_from_counts`],
//! so an online score and an offline score over the same spikes are
//! bit-identical.
//!
//! ```rust
//! use tickspike_math::coincidence::gamma_factor;
//!
//! let reference = [0.010, 0.020, 0.030];
//! let gamma = gamma_factor(&reference, &reference, 0.001, 0.1).unwrap();
//! assert!((gamma - 1.0).abs() < 1e-12);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

use thiserror::Error;

pub mod coincidence;
pub mod stats;

pub use coincidence::{coincidence_count, gamma_factor, gamma_from_counts};
pub use stats::{firing_rate, mean, standard_deviation, variance, RunningStats};

/// Floating point type used throughout the crate
pub type Float = f64;

/// Result type for math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Errors raised by the math routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// An argument is outside the domain of the routine
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input
        reason: String,
    },

    /// Two inputs that must have equal length do not
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },
}

impl MathError {
    /// Create an invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
