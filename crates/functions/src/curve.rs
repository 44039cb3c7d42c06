use serde::{Deserialize, Serialize};
use strata_core::Model;

use crate::{CurveError, ScaleUp, SlopingStep, StepFunction};

/// A scalar function of one variable, stored as an expression tree.
///
/// Composite curves hold their parts by value, so a curve can be cloned into
/// every model variant that needs it, evaluated concurrently and serialised
/// for diagnostics.
///
/// # Examples
///
/// Chaining a detection proportion through a proportion-to-rate conversion:
///
/// ```
/// use strata_functions::{Curve, ScaleUp, ScaleUpMethod};
///
/// let cdr = ScaleUp::new([(1950.0, 0.0), (2015.0, 0.5)], ScaleUpMethod::Linear).unwrap();
/// let detection_rate = Curve::compose(Curve::proportion_to_rate(1.0 / 3.0), Curve::ScaleUp(cdr));
///
/// // A 50% detection proportion competes evenly with the 1/3 other exits.
/// assert!((detection_rate.evaluate(2020.0).unwrap() - 1.0 / 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// The same value everywhere.
    Constant(f64),

    /// Left-continuous steps.
    Step(StepFunction),

    /// Smoothed interpolation of observed data.
    ScaleUp(ScaleUp),

    /// `1 / (1 + exp(-slope * (x - inflection)))`, rising from 0 to 1.
    Logistic {
        inflection: f64,
        #[serde(default = "unit_slope")]
        slope: f64,
    },

    /// A linear ramp between two plateaus.
    SlopingStep(SlopingStep),

    /// Converts a proportion `p` of exits into a rate competing with other
    /// exits of total rate `competing_rate`: `p * competing_rate / (1 - p)`.
    ProportionToRate { competing_rate: f64 },

    /// `factor * curve(x)`.
    Scaled { factor: f64, curve: Box<Curve> },

    /// `1 - curve(x)`.
    Complement(Box<Curve>),

    /// `outer(inner(x))`.
    Compose { outer: Box<Curve>, inner: Box<Curve> },
}

fn unit_slope() -> f64 {
    1.0
}

impl Curve {
    /// A logistic curve through 0.5 at `inflection` with unit slope.
    #[must_use]
    pub fn logistic(inflection: f64) -> Self {
        Self::Logistic {
            inflection,
            slope: unit_slope(),
        }
    }

    /// Converts proportions into rates competing with `competing_rate`.
    #[must_use]
    pub fn proportion_to_rate(competing_rate: f64) -> Self {
        Self::ProportionToRate { competing_rate }
    }

    /// Returns the curve `x ↦ outer(inner(x))`.
    #[must_use]
    pub fn compose(outer: Curve, inner: Curve) -> Self {
        Self::Compose {
            outer: Box::new(outer),
            inner: Box::new(inner),
        }
    }

    /// Returns this curve multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::Scaled {
            factor,
            curve: Box::new(self),
        }
    }

    /// Returns `1 - self`.
    #[must_use]
    pub fn complement(self) -> Self {
        Self::Complement(Box::new(self))
    }

    /// Evaluates the curve at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if a proportion-to-rate node receives a value outside
    /// `[0, 1)`, or if interpolation fails.
    pub fn evaluate(&self, x: f64) -> Result<f64, CurveError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::Step(step) => Ok(step.value_at(x)),
            Self::ScaleUp(scale_up) => scale_up.value_at(x),
            Self::Logistic { inflection, slope } => {
                Ok(1.0 / (1.0 + (-slope * (x - inflection)).exp()))
            }
            Self::SlopingStep(sloping) => Ok(sloping.value_at(x)),
            Self::ProportionToRate { competing_rate } => {
                if !(0.0..1.0).contains(&x) {
                    return Err(CurveError::ProportionOutOfRange(x));
                }
                Ok(x * competing_rate / (1.0 - x))
            }
            Self::Scaled { factor, curve } => Ok(factor * curve.evaluate(x)?),
            Self::Complement(curve) => Ok(1.0 - curve.evaluate(x)?),
            Self::Compose { outer, inner } => outer.evaluate(inner.evaluate(x)?),
        }
    }
}

impl From<f64> for Curve {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<StepFunction> for Curve {
    fn from(step: StepFunction) -> Self {
        Self::Step(step)
    }
}

impl From<ScaleUp> for Curve {
    fn from(scale_up: ScaleUp) -> Self {
        Self::ScaleUp(scale_up)
    }
}

impl From<SlopingStep> for Curve {
    fn from(sloping: SlopingStep) -> Self {
        Self::SlopingStep(sloping)
    }
}

impl Model for Curve {
    type Input = f64;
    type Output = f64;
    type Error = CurveError;

    fn call(&self, input: &f64) -> Result<f64, CurveError> {
        self.evaluate(*input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::ScaleUpMethod;

    #[test]
    fn logistic_passes_half_at_inflection() {
        let infectiousness = Curve::logistic(15.0);

        assert_relative_eq!(infectiousness.evaluate(15.0).unwrap(), 0.5);
        assert!(infectiousness.evaluate(0.0).unwrap() < 1e-6);
        assert!(infectiousness.evaluate(40.0).unwrap() > 0.999_999);
    }

    #[test]
    fn compose_applies_inner_first() {
        let doubled_then_complemented =
            Curve::compose(Curve::Constant(1.0).complement(), Curve::Constant(0.25));
        assert_relative_eq!(doubled_then_complemented.evaluate(7.0).unwrap(), 0.0);

        let cdr = ScaleUp::new([(2000.0, 0.0), (2010.0, 0.5)], ScaleUpMethod::Linear).unwrap();
        let rate = Curve::compose(Curve::proportion_to_rate(2.0), cdr.into());

        assert_relative_eq!(rate.evaluate(1990.0).unwrap(), 0.0);
        assert_relative_eq!(rate.evaluate(2005.0).unwrap(), 0.25 * 2.0 / 0.75);
        assert_relative_eq!(rate.evaluate(2010.0).unwrap(), 2.0);
    }

    #[test]
    fn proportion_to_rate_rejects_certain_exit() {
        let rate = Curve::proportion_to_rate(1.0);
        assert!(matches!(
            rate.evaluate(1.0),
            Err(CurveError::ProportionOutOfRange(_))
        ));
    }

    #[test]
    fn evaluation_is_independent_of_call_order() {
        let cdr = ScaleUp::new(
            [(1950.0, 0.0), (2000.0, 0.3), (2015.0, 0.6)],
            ScaleUpMethod::MonotoneCubic,
        )
        .unwrap();
        let curve = Curve::from(cdr).scaled(2.0);

        let forward: Vec<f64> = [1960.0, 1990.0, 2010.0]
            .iter()
            .map(|&t| curve.evaluate(t).unwrap())
            .collect();
        let backward: Vec<f64> = [2010.0, 1990.0, 1960.0]
            .iter()
            .map(|&t| curve.evaluate(t).unwrap())
            .rev()
            .collect();

        assert_eq!(forward, backward);
    }

    #[test]
    fn curves_round_trip_through_json() {
        let curve = Curve::compose(
            Curve::proportion_to_rate(1.0 / 3.0),
            ScaleUp::new(
                [(1950.0, 0.0), (2015.0, 0.6)],
                ScaleUpMethod::SmoothedLinear { smoothness: 0.2 },
            )
            .unwrap()
            .into(),
        );

        let json = serde_json::to_string(&curve).unwrap();
        let parsed: Curve = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, curve);
        assert_relative_eq!(
            parsed.evaluate(2000.0).unwrap(),
            curve.evaluate(2000.0).unwrap()
        );
    }

    #[test]
    fn model_call_matches_evaluate() {
        let curve = Curve::logistic(5.0);
        assert_relative_eq!(curve.call(&5.0).unwrap(), 0.5);
    }
}
