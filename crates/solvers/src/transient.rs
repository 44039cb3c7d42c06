//! Solvers that integrate an ODE problem forward in time.
//!
//! Both solvers share their observer [`Event`], control [`Action`],
//! [`Solution`] and [`Error`] types, so an observer written for one works with
//! the other.

mod action;
mod error;
mod event;
mod grid;
mod solution;

pub mod dopri5;
pub mod euler;

pub use action::Action;
pub use error::{Error, GridError};
pub use event::Event;
pub use solution::{Solution, Status};

#[cfg(test)]
mod test_utils;
