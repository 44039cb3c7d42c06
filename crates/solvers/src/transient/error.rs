use std::error::Error as StdError;

use ode_solvers::dop_shared::IntegrationError;
use thiserror::Error;

/// Errors that can occur during transient integration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("model error: {0}")]
    Model(#[source] Box<dyn StdError + Send + Sync>),

    #[error("problem error: {0}")]
    Problem(#[source] Box<dyn StdError + Send + Sync>),

    #[error("invalid time grid: {0}")]
    Grid(#[from] GridError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("integration stopped short of the next grid time at t = {time}")]
    Incomplete { time: f64 },
}

impl Error {
    pub(crate) fn model<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Model(Box::new(err))
    }

    pub(crate) fn problem<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Problem(Box::new(err))
    }
}

/// Reasons a time grid is rejected before integration starts.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GridError {
    #[error("the grid has no times")]
    Empty,

    #[error("time at index {index} is not finite")]
    NonFinite { index: usize },

    #[error("time at index {index} does not increase on the previous time")]
    NotIncreasing { index: usize },
}
