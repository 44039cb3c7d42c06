//! Core traits and types for the Strata modeling workspace.
//!
//! This crate defines the shared abstractions that the integrators and the
//! compartmental model build on:
//!
//! - [`Model`] — a callable that maps a typed input to a typed output
//! - [`Snapshot`] — a captured input/output pair from a model call
//! - [`Observer`] — receives solver events and optionally returns control actions
//! - [`OdeProblem`] — adapts a model's input and output to an integrable state
//! - [`StepIntegrable`] and [`FlatState`] — what integrators need from a state

mod model;
mod observer;
mod problems;
mod step;

pub use observer::Observer;
pub use problems::OdeProblem;
pub use step::{DerivativeOf, FlatState, StepIntegrable};
pub use {model::Model, model::Snapshot};
