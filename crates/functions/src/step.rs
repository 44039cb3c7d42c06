use serde::{Deserialize, Serialize};

use crate::CurveError;

/// Threshold below which [`StepFunction::value_at`] uses linear search.
///
/// For functions with fewer than this many breakpoints, a linear scan is used.
/// Otherwise, binary search is performed.
const LINEAR_SEARCH_THRESHOLD: usize = 32;

/// A left-continuous step function built from sparse breakpoints.
///
/// Each breakpoint `b` with value `v` covers `[b, next breakpoint)`, and the
/// last breakpoint extends to infinity. Below the first breakpoint the
/// function is zero.
///
/// # Examples
///
/// ```
/// use strata_functions::StepFunction;
///
/// let latency = StepFunction::new([(0.0, 6.6e-3), (5.0, 2.7e-3), (15.0, 2.7e-4)]).unwrap();
///
/// assert_eq!(latency.value_at(-1.0), 0.0);
/// assert_eq!(latency.value_at(3.0), 6.6e-3);
/// assert_eq!(latency.value_at(5.0), 2.7e-3);
/// assert_eq!(latency.value_at(80.0), 2.7e-4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct StepFunction {
    breakpoints: Vec<f64>,
    values: Vec<f64>,
}

impl StepFunction {
    /// Creates a step function from `(breakpoint, value)` pairs in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no pairs, if any breakpoint or value is
    /// not finite, or if two pairs share a breakpoint.
    pub fn new<I>(pairs: I) -> Result<Self, CurveError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut pairs: Vec<_> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Err(CurveError::Empty);
        }
        if let Some(index) = pairs
            .iter()
            .position(|(b, v)| !b.is_finite() || !v.is_finite())
        {
            return Err(CurveError::NonFinite { index });
        }

        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(index) = pairs.windows(2).position(|pair| pair[0].0 == pair[1].0) {
            return Err(CurveError::NotIncreasing { index: index + 1 });
        }

        let (breakpoints, values) = pairs.into_iter().unzip();
        Ok(Self {
            breakpoints,
            values,
        })
    }

    /// Returns the breakpoints in increasing order.
    #[must_use]
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Returns the value of the greatest breakpoint not above `x`, or zero
    /// when `x` lies below every breakpoint.
    #[must_use]
    pub fn value_at(&self, x: f64) -> f64 {
        let covering = if self.breakpoints.len() < LINEAR_SEARCH_THRESHOLD {
            self.breakpoints.iter().take_while(|&&b| b <= x).count()
        } else {
            self.breakpoints.partition_point(|&b| b <= x)
        };

        match covering {
            0 => 0.0,
            n => self.values[n - 1],
        }
    }
}

impl TryFrom<Vec<(f64, f64)>> for StepFunction {
    type Error = CurveError;

    fn try_from(pairs: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::new(pairs)
    }
}

impl From<StepFunction> for Vec<(f64, f64)> {
    fn from(function: StepFunction) -> Self {
        function.breakpoints.into_iter().zip(function.values).collect()
    }
}
