use ndarray::Array1;
use ninterp::{
    interpolator::Extrapolate,
    prelude::{Interp1DOwned, Interpolator},
    strategy::Linear,
};
use serde::{Deserialize, Serialize};

use crate::CurveError;

/// How a [`ScaleUp`] joins its data points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleUpMethod {
    /// Straight lines between points.
    Linear,

    /// Straight lines whose corners are rounded off with quadratic blends.
    ///
    /// Around each interior point the slope changes linearly from the left
    /// segment's slope to the right one's over a window whose half-width is
    /// `smoothness / 2` times the shorter neighbouring interval. A smoothness
    /// of zero is plain linear interpolation. Because the slope always lies
    /// between the two segment slopes, monotone data gives a monotone curve.
    SmoothedLinear { smoothness: f64 },

    /// Monotone piecewise-cubic Hermite interpolation (Fritsch–Carlson).
    ///
    /// Smooth through every data point, with no overshoot between them.
    MonotoneCubic,
}

/// A smoothed curve through observed `(x, y)` data, typically yearly values
/// such as a case detection rate.
///
/// Outside the sampled range the curve is clamped to the nearest endpoint.
///
/// # Examples
///
/// ```
/// use strata_functions::{ScaleUp, ScaleUpMethod};
///
/// let cdr = ScaleUp::new(
///     [(1950.0, 0.0), (2000.0, 0.4), (2015.0, 0.6)],
///     ScaleUpMethod::SmoothedLinear { smoothness: 0.2 },
/// ).unwrap();
///
/// assert_eq!(cdr.value_at(1900.0).unwrap(), 0.0);
/// assert_eq!(cdr.value_at(2050.0).unwrap(), 0.6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ScaleUpData", into = "ScaleUpData")]
pub struct ScaleUp {
    x: Vec<f64>,
    y: Vec<f64>,
    method: ScaleUpMethod,
    linear: Option<Interp1DOwned<f64, Linear>>,
    tangents: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct ScaleUpData {
    points: Vec<(f64, f64)>,
    method: ScaleUpMethod,
}

impl ScaleUp {
    /// Builds a scale-up curve from data points ordered by `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no points, a value is not finite, the
    /// `x` values are not strictly increasing, or a smoothness lies outside
    /// `[0, 1]`.
    pub fn new<I>(points: I, method: ScaleUpMethod) -> Result<Self, CurveError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (x, y): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();

        if x.is_empty() {
            return Err(CurveError::Empty);
        }
        if let Some(index) = x
            .iter()
            .zip(&y)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(CurveError::NonFinite { index });
        }
        if let Some(index) = x.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(CurveError::NotIncreasing { index: index + 1 });
        }
        if let ScaleUpMethod::SmoothedLinear { smoothness } = method {
            if !(0.0..=1.0).contains(&smoothness) {
                return Err(CurveError::Smoothness(smoothness));
            }
        }

        let linear = if x.len() > 1 {
            Some(Interp1DOwned::new(
                Array1::from(x.clone()),
                Array1::from(y.clone()),
                Linear,
                Extrapolate::Clamp,
            )?)
        } else {
            None
        };

        let tangents = match method {
            ScaleUpMethod::MonotoneCubic => monotone_tangents(&x, &y),
            _ => Vec::new(),
        };

        Ok(Self {
            x,
            y,
            method,
            linear,
            tangents,
        })
    }

    /// Returns the interpolation method.
    #[must_use]
    pub fn method(&self) -> ScaleUpMethod {
        self.method
    }

    /// Returns the data points as `(x, y)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// Evaluates the curve at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` is NaN.
    pub fn value_at(&self, x: f64) -> Result<f64, CurveError> {
        if x.is_nan() {
            return Err(CurveError::NotANumber);
        }
        let Some(linear) = &self.linear else {
            return Ok(self.y[0]);
        };

        let last = self.x.len() - 1;
        if x <= self.x[0] {
            return Ok(self.y[0]);
        }
        if x >= self.x[last] {
            return Ok(self.y[last]);
        }

        match self.method {
            ScaleUpMethod::Linear => Ok(linear.interpolate(&[x])?),
            ScaleUpMethod::SmoothedLinear { smoothness } => match self.corner(x, smoothness) {
                Some(value) => Ok(value),
                None => Ok(linear.interpolate(&[x])?),
            },
            ScaleUpMethod::MonotoneCubic => Ok(self.hermite(x)),
        }
    }

    /// Index of the segment `[x[k], x[k + 1])` containing `x`, clamped to the
    /// first and last segments. Needs at least two points.
    fn segment(&self, x: f64) -> usize {
        self.x
            .partition_point(|&xi| xi <= x)
            .saturating_sub(1)
            .min(self.x.len() - 2)
    }

    fn slope(&self, segment: usize) -> f64 {
        (self.y[segment + 1] - self.y[segment]) / (self.x[segment + 1] - self.x[segment])
    }

    /// Returns the blended value if `x` falls in the rounded corner of an
    /// interior data point.
    fn corner(&self, x: f64, smoothness: f64) -> Option<f64> {
        let segment = self.segment(x);
        let last = self.x.len() - 1;

        [segment, segment + 1]
            .into_iter()
            .filter(|&knot| knot > 0 && knot < last)
            .find_map(|knot| {
                let left = self.x[knot] - self.x[knot - 1];
                let right = self.x[knot + 1] - self.x[knot];
                let half_width = 0.5 * smoothness * left.min(right);
                if half_width <= 0.0 || (x - self.x[knot]).abs() >= half_width {
                    return None;
                }

                let slope_left = self.slope(knot - 1);
                let slope_right = self.slope(knot);
                let u = x - (self.x[knot] - half_width);
                Some(
                    self.y[knot] - half_width * slope_left
                        + slope_left * u
                        + (slope_right - slope_left) * u * u / (4.0 * half_width),
                )
            })
    }

    fn hermite(&self, x: f64) -> f64 {
        let k = self.segment(x);
        let h = self.x[k + 1] - self.x[k];
        let t = (x - self.x[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        (2.0 * t3 - 3.0 * t2 + 1.0) * self.y[k]
            + (t3 - 2.0 * t2 + t) * h * self.tangents[k]
            + (-2.0 * t3 + 3.0 * t2) * self.y[k + 1]
            + (t3 - t2) * h * self.tangents[k + 1]
    }
}

/// Fritsch–Carlson tangents: zero at local extrema, a weighted harmonic mean
/// of the neighbouring secants elsewhere, one-sided at the ends.
fn monotone_tangents(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let widths: Vec<f64> = x.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let secants: Vec<f64> = y
        .windows(2)
        .zip(&widths)
        .map(|(pair, width)| (pair[1] - pair[0]) / width)
        .collect();

    let mut tangents = vec![0.0; n];
    tangents[0] = secants[0];
    tangents[n - 1] = secants[n - 2];
    for k in 1..n - 1 {
        let (left, right) = (secants[k - 1], secants[k]);
        if left * right <= 0.0 {
            continue;
        }
        let w1 = 2.0 * widths[k] + widths[k - 1];
        let w2 = widths[k] + 2.0 * widths[k - 1];
        tangents[k] = (w1 + w2) / (w1 / left + w2 / right);
    }
    tangents
}

impl PartialEq for ScaleUp {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.method == other.method
    }
}

impl TryFrom<ScaleUpData> for ScaleUp {
    type Error = CurveError;

    fn try_from(data: ScaleUpData) -> Result<Self, Self::Error> {
        Self::new(data.points, data.method)
    }
}

impl From<ScaleUp> for ScaleUpData {
    fn from(curve: ScaleUp) -> Self {
        Self {
            points: curve.points().collect(),
            method: curve.method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const METHODS: [ScaleUpMethod; 3] = [
        ScaleUpMethod::Linear,
        ScaleUpMethod::SmoothedLinear { smoothness: 0.2 },
        ScaleUpMethod::MonotoneCubic,
    ];

    fn detection_data() -> Vec<(f64, f64)> {
        vec![
            (1950.0, 0.0),
            (1990.0, 0.1),
            (2000.0, 0.35),
            (2005.0, 0.38),
            (2010.0, 0.6),
            (2015.0, 0.61),
        ]
    }

    #[test]
    fn monotone_data_gives_non_decreasing_curves() {
        for method in METHODS {
            let curve = ScaleUp::new(detection_data(), method).unwrap();

            let mut previous = f64::NEG_INFINITY;
            for i in 0..=1000 {
                let year = 1900.0 + f64::from(i) * 0.15;
                let value = curve.value_at(year).unwrap();
                assert!(
                    value >= previous - 1e-12,
                    "{method:?} decreased at {year}: {previous} -> {value}"
                );
                previous = value;
            }
        }
    }

    #[test]
    fn passes_through_data_away_from_rounded_corners() {
        for method in [ScaleUpMethod::Linear, ScaleUpMethod::MonotoneCubic] {
            let curve = ScaleUp::new(detection_data(), method).unwrap();
            for (x, y) in detection_data() {
                assert_relative_eq!(curve.value_at(x).unwrap(), y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn clamps_outside_sampled_range() {
        for method in METHODS {
            let curve = ScaleUp::new(detection_data(), method).unwrap();
            assert_relative_eq!(curve.value_at(1800.0).unwrap(), 0.0);
            assert_relative_eq!(curve.value_at(2100.0).unwrap(), 0.61);
        }
    }

    #[test]
    fn smoothed_corner_is_continuous() {
        let curve = ScaleUp::new(
            [(0.0, 0.0), (10.0, 1.0), (20.0, 1.0)],
            ScaleUpMethod::SmoothedLinear { smoothness: 1.0 },
        )
        .unwrap();

        // The corner at x = 10 is rounded over [5, 15].
        assert_relative_eq!(curve.value_at(5.0).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(curve.value_at(15.0).unwrap(), 1.0, epsilon = 1e-12);
        assert!(curve.value_at(10.0).unwrap() < 1.0);
        assert_relative_eq!(
            curve.value_at(5.0 - 1e-9).unwrap(),
            curve.value_at(5.0 + 1e-9).unwrap(),
            epsilon = 1e-8
        );
    }

    #[test]
    fn single_point_is_constant() {
        let curve = ScaleUp::new([(2000.0, 0.3)], ScaleUpMethod::MonotoneCubic).unwrap();
        assert_relative_eq!(curve.value_at(1000.0).unwrap(), 0.3);
        assert_relative_eq!(curve.value_at(3000.0).unwrap(), 0.3);
    }

    #[test]
    fn nan_is_an_error_for_every_method() {
        for method in METHODS {
            let curve = ScaleUp::new(detection_data(), method).unwrap();
            assert!(matches!(
                curve.value_at(f64::NAN),
                Err(CurveError::NotANumber)
            ));
        }

        let single = ScaleUp::new([(2000.0, 0.3)], ScaleUpMethod::Linear).unwrap();
        assert!(matches!(single.value_at(f64::NAN), Err(CurveError::NotANumber)));
    }

    #[test]
    fn infinite_inputs_clamp_to_the_endpoints() {
        for method in METHODS {
            let curve = ScaleUp::new(detection_data(), method).unwrap();
            assert_relative_eq!(curve.value_at(f64::NEG_INFINITY).unwrap(), 0.0);
            assert_relative_eq!(curve.value_at(f64::INFINITY).unwrap(), 0.61);
        }
    }

    #[test]
    fn rejects_invalid_data() {
        assert!(matches!(
            ScaleUp::new([(1.0, 0.0), (1.0, 1.0)], ScaleUpMethod::Linear),
            Err(CurveError::NotIncreasing { index: 1 })
        ));
        assert!(matches!(
            ScaleUp::new(
                [(0.0, 0.0), (1.0, 1.0)],
                ScaleUpMethod::SmoothedLinear { smoothness: 1.5 }
            ),
            Err(CurveError::Smoothness(_))
        ));
    }
}
