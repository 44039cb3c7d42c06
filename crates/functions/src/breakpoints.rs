use std::collections::BTreeMap;

use crate::{Curve, CurveError};

/// Days per year used when converting daily rates to yearly rates.
pub const DAYS_PER_YEAR: f64 = 365.251;

/// Converts a rate per day into a rate per year.
#[must_use]
pub fn per_day_to_per_year(rate: f64) -> f64 {
    rate * DAYS_PER_YEAR
}

/// Formats a numeric breakpoint as a stratum label (`5.0` → `"5"`).
#[must_use]
pub fn stratum_label(breakpoint: f64) -> String {
    format!("{breakpoint}")
}

/// Samples `curve` at each breakpoint, keyed by the breakpoint's stratum label.
///
/// This turns an age-dependent curve into per-stratum values for an age
/// stratification, for example infectiousness weights or latency rates.
///
/// # Errors
///
/// Returns an error if the curve cannot be evaluated at a breakpoint.
pub fn values_at_breakpoints(
    curve: &Curve,
    breakpoints: &[f64],
) -> Result<BTreeMap<String, f64>, CurveError> {
    breakpoints
        .iter()
        .map(|&breakpoint| Ok((stratum_label(breakpoint), curve.evaluate(breakpoint)?)))
        .collect()
}
