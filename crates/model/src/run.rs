use ndarray::Array2;
use strata_solvers::transient::{dopri5, euler};

use crate::{
    CompartmentalModel, Outputs, RunError,
    dynamics::{Dynamics, PopulationInput, PopulationProblem, Populations},
};

/// The solver used to integrate a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Integrator {
    /// Forward Euler with equal steps between output times.
    Euler(euler::Config),

    /// Adaptive Dormand–Prince 5(4).
    Dopri5(dopri5::Config),
}

impl Default for Integrator {
    fn default() -> Self {
        Self::Dopri5(dopri5::Config::default())
    }
}

impl CompartmentalModel {
    /// Integrates the model over `times`, starting from its initial
    /// populations at `times[0]`.
    ///
    /// Outputs are sampled exactly at `times`. Populations pushed below zero
    /// by an accepted step are clamped and reported in
    /// [`Outputs::warnings`].
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter cannot be resolved, if `times` is
    /// empty, not finite or not strictly increasing, or if the solver fails.
    pub fn run(&self, times: &[f64], integrator: &Integrator) -> Result<Outputs, RunError> {
        let dynamics = Dynamics::new(self)?;
        let names: Vec<String> = self.compartment_names().map(str::to_owned).collect();
        let problem = PopulationProblem::new(names.clone());
        let initial = PopulationInput {
            time: times.first().copied().unwrap_or_default(),
            populations: Populations(self.initial_populations()),
        };

        log::debug!(
            "running {} compartments over {} output times with {integrator:?}",
            names.len(),
            times.len(),
        );

        let solution = match integrator {
            Integrator::Euler(config) => {
                euler::solve_unobserved(&dynamics, &problem, initial, times, config)?
            }
            Integrator::Dopri5(config) => {
                dopri5::solve_unobserved(&dynamics, &problem, initial, times, config)?
            }
        };

        log::debug!(
            "run finished after {} steps ({} rejected)",
            solution.steps,
            solution.rejected,
        );

        let values = Array2::from_shape_fn((solution.history.len(), names.len()), |(i, j)| {
            solution.history[i].input.populations.0[j]
        });

        Ok(Outputs::new(
            solution.times,
            names,
            values,
            problem.into_warnings(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::Flow;

    fn decay() -> CompartmentalModel {
        let mut model = CompartmentalModel::new(["infectious", "recovered"]).unwrap();
        model.set_remainder_compartment("infectious").unwrap();
        model
            .set_initial_population(1.0, std::iter::empty::<(&str, f64)>())
            .unwrap();
        model.add_parameter("recovery", 0.5);
        model
            .add_transition_flow(Flow::transition("recovery", "infectious", "recovered"))
            .unwrap();
        model
    }

    #[test]
    fn samples_outputs_on_the_grid() {
        let times = [0.0, 1.0, 2.0, 4.0];
        let outputs = decay().run(&times, &Integrator::default()).unwrap();

        assert_eq!(outputs.times(), times);
        assert_eq!(outputs.values().dim(), (4, 2));
        for (row, &time) in times.iter().enumerate() {
            assert_relative_eq!(
                outputs.values()[(row, 0)],
                (-0.5 * time).exp(),
                epsilon = 1e-5
            );
        }
        assert!(outputs.warnings().is_empty());
    }

    #[test]
    fn euler_and_dopri5_agree() {
        let times = [0.0, 2.0];
        let euler = Integrator::Euler(euler::Config::new(1e-4).unwrap());

        let coarse = decay().run(&times, &euler).unwrap();
        let fine = decay().run(&times, &Integrator::default()).unwrap();

        assert_relative_eq!(
            coarse.values()[(1, 0)],
            fine.values()[(1, 0)],
            epsilon = 1e-4
        );
    }

    #[test]
    fn unknown_parameters_abort_the_run() {
        let mut model = decay();
        model
            .add_transition_flow(Flow::death("tb_death", "infectious"))
            .unwrap();

        assert!(matches!(
            model.run(&[0.0, 1.0], &Integrator::default()),
            Err(RunError::Parameter(_))
        ));
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(matches!(
            decay().run(&[], &Integrator::default()),
            Err(RunError::Solver(_))
        ));
        assert!(matches!(
            decay().run(&[0.0, 2.0, 1.0], &Integrator::default()),
            Err(RunError::Solver(_))
        ));
    }

    #[test]
    fn clamps_overshooting_populations() {
        let mut model = decay();
        model.add_parameter("recovery", 30.0);
        let euler = Integrator::Euler(euler::Config::new(0.1).unwrap());

        let outputs = model.run(&[0.0, 0.1], &euler).unwrap();

        assert_relative_eq!(outputs.values()[(1, 0)], 0.0);
        assert_eq!(outputs.warnings().len(), 1);
        assert_eq!(outputs.warnings()[0].compartment, "infectious");
    }
}
