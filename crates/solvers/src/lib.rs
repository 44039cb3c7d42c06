//! Numerical integrators for the Strata workspace.
//!
//! Every solver here integrates an [`OdeProblem`] over a strictly increasing
//! grid of output times and reports the model snapshot at exactly those
//! times, however many internal steps it takes in between.
//!
//! - [`transient::euler`] — fixed-step forward Euler, sub-stepped between grid points
//! - [`transient::dopri5`] — adaptive Dormand–Prince 5(4) from `ode_solvers`, restarted at each grid point
//!
//! [`OdeProblem`]: strata_core::OdeProblem

pub mod transient;
