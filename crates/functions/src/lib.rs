//! Scalar functions of one variable used wherever a rate is not constant.
//!
//! Every function is a [`Curve`]: a serialisable expression tree that is
//! evaluated on demand. Curves are pure, so an integrator may call them any
//! number of times and in any order. The variable is usually calendar time,
//! but age-dependent curves (infectiousness, waning efficacy) use the same
//! machinery and are sampled at age breakpoints with [`values_at_breakpoints`].
//!
//! - [`StepFunction`] — left-continuous steps from sparse breakpoints
//! - [`ScaleUp`] — smoothed interpolation of observed data, clamped at the ends
//! - [`Curve::logistic`], [`SlopingStep`] — sigmoid and ramped transitions
//! - [`Curve::compose`] — `x ↦ outer(inner(x))`

mod breakpoints;
mod curve;
mod error;
mod scale_up;
mod sloping;
mod step;

pub use breakpoints::{DAYS_PER_YEAR, per_day_to_per_year, stratum_label, values_at_breakpoints};
pub use curve::Curve;
pub use error::CurveError;
pub use scale_up::{ScaleUp, ScaleUpMethod};
pub use sloping::SlopingStep;
pub use step::StepFunction;
