//! Error types for the tickspike runtime

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while building or running a network
#[derive(Error, Debug)]
pub enum SimError {
    /// Error raised by the numeric helpers
    #[error("Math error: {source}")]
    Math {
        #[from]
        /// Source math error
        source: tickspike_math::MathError,
    },

    /// Invalid network or monitor configuration
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Neuron index outside the tracked or available range
    #[error("Index {index} out of range (population of {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Size of the population the index refers to
        len: usize,
    },

    /// State variable not provided by a group
    #[error("Unknown state variable '{name}'")]
    UnknownVariable {
        /// Variable name
        name: String,
    },

    /// Group id not registered with this network
    #[error("Group {id} not found")]
    UnknownGroup {
        /// Group index
        id: usize,
    },

    /// Clock id not registered with this network
    #[error("Clock {id} not found")]
    UnknownClock {
        /// Clock index
        id: usize,
    },

    /// Operation handle not registered with this network
    #[error("Operation {id} not found")]
    UnknownOperation {
        /// Operation index
        id: usize,
    },

    /// Handle or group accessed as the wrong concrete type
    #[error("Item {id} is not a {expected}")]
    HandleType {
        /// Index of the item
        id: usize,
        /// Requested type name
        expected: &'static str,
    },
}

impl SimError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create an index error
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Create an unknown variable error
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    /// True for errors raised by invalid setup rather than by a query
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::InvalidParameter { .. }
        )
    }
}
