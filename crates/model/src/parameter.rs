use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_functions::Curve;

use crate::ParameterError;

/// The value bound to a parameter name.
///
/// Scaled values refer to their parent by name and are resolved when a run
/// starts, so overriding a parent also moves every parameter derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Constant(f64),
    Scaled { parent: String, factor: f64 },
    TimeVariant(Curve),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<Curve> for ParameterValue {
    fn from(curve: Curve) -> Self {
        Self::TimeVariant(curve)
    }
}

/// How a stratum changes a parameter it inherits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    /// Replaces the inherited value.
    Absolute(f64),

    /// Multiplies the inherited value.
    Multiply(f64),

    /// Replaces the inherited value with a function of time.
    TimeVariant(Curve),
}

impl Adjustment {
    /// The value of the adjusted parameter derived from `parent`.
    ///
    /// `split` is the share of the parent's rate the stratum receives when a
    /// flow is split across destination strata. Replacements ignore it.
    pub(crate) fn apply(&self, parent: &str, split: f64) -> ParameterValue {
        match self {
            Self::Absolute(value) => ParameterValue::Constant(*value),
            Self::Multiply(factor) => ParameterValue::Scaled {
                parent: parent.to_owned(),
                factor: factor * split,
            },
            Self::TimeVariant(curve) => ParameterValue::TimeVariant(curve.clone()),
        }
    }
}

/// A parameter reduced to a constant or a scaled curve.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rate {
    Constant(f64),
    TimeVariant { factor: f64, curve: Curve },
}

impl Rate {
    pub(crate) fn at(&self, name: &str, time: f64) -> Result<f64, ParameterError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::TimeVariant { factor, curve } => curve
                .evaluate(time)
                .map(|value| factor * value)
                .map_err(|source| ParameterError::Curve {
                    name: name.to_owned(),
                    source,
                }),
        }
    }
}

/// Follows `name` through its parents down to a constant or a curve.
pub(crate) fn compile(
    parameters: &BTreeMap<String, ParameterValue>,
    name: &str,
) -> Result<Rate, ParameterError> {
    let mut factor = 1.0;
    let mut current = name;

    for _ in 0..=parameters.len() {
        match parameters
            .get(current)
            .ok_or_else(|| ParameterError::Unknown(current.to_owned()))?
        {
            ParameterValue::Constant(value) => return Ok(Rate::Constant(factor * value)),
            ParameterValue::TimeVariant(curve) => {
                return Ok(Rate::TimeVariant {
                    factor,
                    curve: curve.clone(),
                });
            }
            ParameterValue::Scaled {
                parent,
                factor: scale,
            } => {
                factor *= scale;
                current = parent;
            }
        }
    }

    Err(ParameterError::Cycle(name.to_owned()))
}

/// Resolves `name` at `time`.
pub(crate) fn resolve(
    parameters: &BTreeMap<String, ParameterValue>,
    name: &str,
    time: f64,
) -> Result<f64, ParameterError> {
    compile(parameters, name)?.at(name, time)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn parameters() -> BTreeMap<String, ParameterValue> {
        BTreeMap::from([
            ("beta".to_owned(), ParameterValue::Constant(20.0)),
            (
                "betaXage_5".to_owned(),
                ParameterValue::Scaled {
                    parent: "beta".into(),
                    factor: 0.5,
                },
            ),
            (
                "betaXage_5Xstrain_mdr".to_owned(),
                ParameterValue::Scaled {
                    parent: "betaXage_5".into(),
                    factor: 0.8,
                },
            ),
            (
                "treatment".to_owned(),
                ParameterValue::TimeVariant(Curve::logistic(2000.0)),
            ),
        ])
    }

    #[test]
    fn resolves_through_parents() {
        let parameters = parameters();

        assert_relative_eq!(resolve(&parameters, "beta", 0.0).unwrap(), 20.0);
        assert_relative_eq!(
            resolve(&parameters, "betaXage_5Xstrain_mdr", 0.0).unwrap(),
            8.0
        );
        assert_relative_eq!(resolve(&parameters, "treatment", 2000.0).unwrap(), 0.5);
    }

    #[test]
    fn overriding_a_parent_moves_its_children() {
        let mut parameters = parameters();
        parameters.insert("beta".into(), ParameterValue::Constant(10.0));

        assert_relative_eq!(resolve(&parameters, "betaXage_5", 0.0).unwrap(), 5.0);
    }

    #[test]
    fn unknown_and_cyclic_parameters_fail() {
        let mut parameters = parameters();
        assert!(matches!(
            resolve(&parameters, "gamma", 0.0),
            Err(ParameterError::Unknown(name)) if name == "gamma"
        ));

        parameters.insert(
            "beta".into(),
            ParameterValue::Scaled {
                parent: "betaXage_5".into(),
                factor: 1.0,
            },
        );
        assert!(matches!(
            resolve(&parameters, "beta", 0.0),
            Err(ParameterError::Cycle(_))
        ));
    }

    #[test]
    fn adjustments_scale_destination_splits() {
        let multiply = Adjustment::Multiply(2.0).apply("beta", 0.25);
        assert_eq!(
            multiply,
            ParameterValue::Scaled {
                parent: "beta".into(),
                factor: 0.5
            }
        );
        assert_eq!(
            Adjustment::Absolute(3.0).apply("beta", 0.25),
            ParameterValue::Constant(3.0)
        );
    }

    #[test]
    fn values_deserialize_untagged() {
        let constant: ParameterValue = serde_json::from_str("0.25").unwrap();
        let scaled: ParameterValue =
            serde_json::from_str(r#"{ "parent": "beta", "factor": 2.0 }"#).unwrap();
        let curve: ParameterValue =
            serde_json::from_str(r#"{ "logistic": { "inflection": 15.0 } }"#).unwrap();

        assert_eq!(constant, ParameterValue::Constant(0.25));
        assert!(matches!(scaled, ParameterValue::Scaled { .. }));
        assert_eq!(curve, ParameterValue::TimeVariant(Curve::logistic(15.0)));
    }
}
