use ninterp::error::{InterpolateError, ValidateError};
use thiserror::Error;

/// Errors raised while building or evaluating a [`Curve`](crate::Curve).
#[derive(Debug, Error)]
pub enum CurveError {
    #[error("a curve needs at least one data point")]
    Empty,

    #[error("value at index {index} is not finite")]
    NonFinite { index: usize },

    #[error("x at index {index} does not increase on the previous x")]
    NotIncreasing { index: usize },

    #[error("smoothness must lie in [0, 1], got {0}")]
    Smoothness(f64),

    #[error("onset {onset} must come before offset {offset}")]
    SlopeOrder { onset: f64, offset: f64 },

    #[error("cannot evaluate a curve at NaN")]
    NotANumber,

    #[error("proportion {0} cannot be converted to a rate; it must lie in [0, 1)")]
    ProportionOutOfRange(f64),

    #[error(transparent)]
    Validation(#[from] ValidateError),

    #[error(transparent)]
    Interpolation(#[from] InterpolateError),
}
