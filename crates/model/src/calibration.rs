use serde::{Deserialize, Serialize};

use crate::{CompartmentalModel, EvaluationError, Integrator, NumericalWarning, Outputs};

/// A model output requested by a calibration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Queries selecting the compartments to sum, as in
    /// [`Outputs::total_compartment_size`].
    pub compartments: Vec<String>,

    /// Report the share of the total population rather than a count.
    #[serde(default)]
    pub proportion: bool,

    /// Output times at which to report the value.
    pub times: Vec<f64>,
}

/// The values of every requested target from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// One entry per target, holding one value per requested time.
    pub values: Vec<Vec<f64>>,

    /// Populations clamped during the run, which a calibration layer may
    /// penalise.
    pub warnings: Vec<NumericalWarning>,
}

impl Target {
    fn extract(&self, outputs: &Outputs) -> Result<Vec<f64>, EvaluationError> {
        let series = if self.proportion {
            outputs.proportion_of(&self.compartments)?
        } else {
            outputs.total_compartment_size(&self.compartments)?
        };
        self.times
            .iter()
            .map(|&time| Ok(series[outputs.time_index(time)?]))
            .collect()
    }
}

impl CompartmentalModel {
    /// Runs a copy of the model with constant parameter overrides and reports
    /// each target.
    ///
    /// Either every target is reported or none is: any failure returns an
    /// error and no values.
    ///
    /// # Errors
    ///
    /// Returns an error if an override names an unknown parameter, the run
    /// fails, or a target selects no compartment or asks for a time not in
    /// `times`.
    pub fn evaluate<K: AsRef<str>>(
        &self,
        overrides: impl IntoIterator<Item = (K, f64)>,
        times: &[f64],
        integrator: &Integrator,
        targets: &[Target],
    ) -> Result<Evaluation, EvaluationError> {
        let outputs = self.with_overrides(overrides)?.run(times, integrator)?;
        let values = targets
            .iter()
            .map(|target| target.extract(&outputs))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Evaluation {
            values,
            warnings: outputs.warnings().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::{Flow, OutputError};

    fn decay() -> CompartmentalModel {
        let mut model = CompartmentalModel::new(["infectious", "recovered"]).unwrap();
        model.set_remainder_compartment("infectious").unwrap();
        model
            .set_initial_population(100.0, [("recovered", 0.0)])
            .unwrap();
        model.add_parameter("recovery", 1.0);
        model
            .add_transition_flow(Flow::transition("recovery", "infectious", "recovered"))
            .unwrap();
        model
    }

    #[test]
    fn overrides_change_the_run_only() {
        let model = decay();
        let targets = [
            Target {
                compartments: vec!["infectious".into()],
                proportion: false,
                times: vec![1.0, 2.0],
            },
            Target {
                compartments: vec!["recovered".into()],
                proportion: true,
                times: vec![2.0],
            },
        ];

        let evaluation = model
            .evaluate(
                [("recovery", 0.5)],
                &[0.0, 1.0, 2.0],
                &Integrator::default(),
                &targets,
            )
            .unwrap();

        assert_relative_eq!(evaluation.values[0][0], 100.0 * (-0.5_f64).exp(), epsilon = 1e-3);
        assert_relative_eq!(evaluation.values[0][1], 100.0 * (-1.0_f64).exp(), epsilon = 1e-3);
        assert_relative_eq!(evaluation.values[1][0], 1.0 - (-1.0_f64).exp(), epsilon = 1e-5);
        assert!(evaluation.warnings.is_empty());
        assert_relative_eq!(model.parameter_at("recovery", 0.0).unwrap(), 1.0);
    }

    #[test]
    fn failures_return_no_values() {
        let model = decay();
        let off_grid = [Target {
            compartments: vec!["infectious".into()],
            proportion: false,
            times: vec![1.5],
        }];

        assert!(matches!(
            model.evaluate(
                std::iter::empty::<(&str, f64)>(),
                &[0.0, 1.0],
                &Integrator::default(),
                &off_grid
            ),
            Err(EvaluationError::Output(OutputError::TimeNotInGrid(_)))
        ));
        assert!(matches!(
            model.evaluate([("beta", 1.0)], &[0.0, 1.0], &Integrator::default(), &[]),
            Err(EvaluationError::Structural(_))
        ));
    }
}
