use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by calibration and simulation.
///
/// Both kinds are input errors: they are returned before any work is done
/// and the caller has to fix the input before trying again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Too few usable price observations to estimate return statistics
    #[error("insufficient data: need at least {required} valid prices, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A configuration or model parameter is out of range
    #[error("invalid config '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl SimError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidConfig { field, reason: reason.into() }
    }
}

