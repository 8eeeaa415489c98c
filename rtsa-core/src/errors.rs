use crate::series::Time;
use thiserror::Error;

/// Error type for invalid operations.
///
/// Configuration errors abort a call before any simulation happens,
/// data errors describe stresses that cannot be combined and
/// numerical errors describe parameter vectors that drive a response function
/// into a regime where no finite response exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TsaError {
    #[error("{0}")]
    Error(String),
    #[error("Parameter '{0}' is not present in the model")]
    UnknownParameter(String),
    #[error("Specified tmax ({tmax}) is not larger than the specified tmin ({tmin})")]
    InvalidTimeRange { tmin: Time, tmax: Time },
    #[error("No observations between tmin ({tmin}) and tmax ({tmax})")]
    NoObservations { tmin: Time, tmax: Time },
    #[error("A stress model named '{0}' already exists for this model. Select another name or replace it explicitly")]
    DuplicateStressModel(String),
    #[error("No stress model named '{0}' is present in the model")]
    UnknownStressModel(String),
    #[error("Invalid frequency '{0}'. Expected a positive multiple of W, D, H, min or s, e.g. '7D'")]
    InvalidFrequency(String),
    #[error("The time offsets of the stresses differ from each other: {0:?}")]
    InconsistentTimeOffset(Vec<Time>),
    #[error("Expected {expected} parameters, got {got}")]
    ParameterCount { expected: usize, got: usize },
    #[error("Noise cannot be calculated if there is no noise model")]
    MissingNoiseModel,
    #[error("Invalid settings: {0}")]
    Settings(String),
    #[error("The stresses of '{name}' have no overlapping time indices. Make sure the time indices overlap or use separate stress models")]
    EmptyIntersection { name: String },
    #[error("Invalid series '{name}': {reason}")]
    InvalidSeries { name: String, reason: String },
    #[error("Degenerate {rfunc} response: {reason}")]
    DegenerateResponse { rfunc: String, reason: String },
    #[error("Solver failed: {0}")]
    Solver(String),
}

impl TsaError {
    /// Whether the error describes an invalid model configuration.
    ///
    /// These must be fixed by the caller before a simulation can be run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TsaError::UnknownParameter(_)
                | TsaError::InvalidTimeRange { .. }
                | TsaError::NoObservations { .. }
                | TsaError::DuplicateStressModel(_)
                | TsaError::UnknownStressModel(_)
                | TsaError::InvalidFrequency(_)
                | TsaError::InconsistentTimeOffset(_)
                | TsaError::ParameterCount { .. }
                | TsaError::MissingNoiseModel
                | TsaError::Settings(_)
        )
    }

    pub(crate) fn invalid_series(name: &str, reason: impl Into<String>) -> Self {
        TsaError::InvalidSeries {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(rfunc: &str, reason: impl Into<String>) -> Self {
        TsaError::DegenerateResponse {
            rfunc: rfunc.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type for `Result<T, TsaError>`.
pub type TsaResult<T> = Result<T, TsaError>;
