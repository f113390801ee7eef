//! Error types for the pond simulation.

use thiserror::Error;

/// Failures of the adaptive time integration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    /// The step size needed to meet the tolerances fell below the minimum.
    #[error("Step size underflow at t = {t}: h = {h:e}")]
    StepSizeUnderflow { t: f64, h: f64 },

    /// The step budget for one output interval was exhausted.
    #[error("Too many steps while integrating from t = {t}")]
    TooManySteps { t: f64 },

    /// A NaN or infinite depth or derivative appeared.
    #[error("Non-finite state at t = {t}")]
    NonFiniteState { t: f64 },
}

#[derive(Error, Debug)]
pub enum PondsError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Integration failed: {0}")]
    Integration(#[from] IntegrationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PondsError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_error_converts_into_ponds_error() {
        let err: PondsError =
            IntegrationError::TooManySteps { t: 10.0 }.into();
        assert!(matches!(
            err,
            PondsError::Integration(IntegrationError::TooManySteps { .. })
        ));
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = PondsError::invalid_parameter("bottom area must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: bottom area must be > 0"
        );
    }
}
