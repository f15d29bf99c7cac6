// src/omnixtracker/omnixerror.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[OMNIXTRACKER]Xyn>=====S===t===u===d===i===o===s======[R|$>

use ndarray_stats::errors::MinMaxError;
use tracing::{error, warn};
use thiserror::Error;

pub type Result<T, E = NTMError> = std::result::Result<T, E>;

// Every failure the NTM core surfaces. Nothing is retried: a failed call leaves
// the previous recurrent state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NTMError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: expected {expected:?}, actual {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Memory error: {0}")]
    MemoryError(String),
}

impl NTMError {
    pub fn shape(expected: &[usize], actual: &[usize]) -> Self {
        NTMError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub fn log(&self) {
        match self {
            NTMError::InvalidConfig(_) | NTMError::NotInitialized(_) => {
                warn!("{}", self);
            }
            _ => {
                error!("{}", self);
            }
        }
    }
}

impl From<MinMaxError> for NTMError {
    fn from(err: MinMaxError) -> Self {
        match err {
            MinMaxError::EmptyInput => {
                NTMError::InvalidArgument("Input array is empty in softmax".to_string())
            }
            MinMaxError::UndefinedOrder => {
                NTMError::ComputationError("Input array contains NaN values in softmax".to_string())
            }
        }
    }
}
