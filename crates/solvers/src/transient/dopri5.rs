//! Adaptive Dormand–Prince 5(4) solver sampled on a time grid.
//!
//! Each interval between consecutive grid times is integrated by
//! [`ode_solvers::Dopri5`], which picks its own steps from the embedded
//! fourth-order error estimate. The state reached at the end of an interval
//! goes through [`OdeProblem::finalize_step`] before the next interval
//! starts, so a problem that projects its state (for example by clamping
//! negative values) does so once per grid time.
//!
//! # Observer Events
//!
//! An [`Event`] is emitted for the initial state and at every later grid
//! time. Observers can return [`Action::StopEarly`] to end the run with the
//! grid samples collected so far.

mod config;

pub use config::{Config, ConfigError};

use std::{cell::RefCell, rc::Rc};

use ode_solvers::{DVector, System};
use strata_core::{DerivativeOf, FlatState, Model, Observer, OdeProblem, Snapshot};

use super::{Action, Error, Event, Solution, Status, grid};

/// Integrates an ODE problem over `times` using adaptive Dormand–Prince 5(4).
///
/// `initial` must be the model input at `times[0]`.
///
/// # Errors
///
/// Returns an error if the grid is invalid, if the model or problem fails,
/// or if the underlying integrator gives up on an interval.
pub fn solve<M, P, Obs>(
    model: &M,
    problem: &P,
    initial: M::Input,
    times: &[f64],
    config: &Config,
    mut observer: Obs,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    M::Input: Clone,
    M::Output: Clone,
    P: OdeProblem<Input = M::Input, Output = M::Output, Delta = f64>,
    P::State: FlatState,
    DerivativeOf<P::State, f64>: FlatState,
    Obs: Observer<Event<M::Input, M::Output>, Action>,
{
    grid::validate(times)?;

    let initial_output = model.call(&initial).map_err(Error::model)?;
    let mut current = Snapshot::new(initial, initial_output);

    let mut solution = Solution {
        status: Status::Complete,
        times: vec![times[0]],
        history: vec![current.clone()],
        steps: 0,
        rejected: 0,
    };

    let event = Event {
        step: 0,
        time: times[0],
        snapshot: current.clone(),
    };
    if let Some(Action::StopEarly) = observer.observe(&event) {
        solution.status = Status::StoppedByObserver;
        return Ok(solution);
    }

    for window in times.windows(2) {
        let (start, end) = (window[0], window[1]);

        let reached = advance(model, problem, &current, start, end, config)?;
        solution.steps += reached.accepted;
        solution.rejected += reached.rejected;

        let next_input = problem
            .finalize_step(reached.input, &current.input, &current.output, &(end - start))
            .map_err(Error::problem)?;
        let next_output = model.call(&next_input).map_err(Error::model)?;
        current = Snapshot::new(next_input, next_output);

        solution.times.push(end);
        solution.history.push(current.clone());

        let event = Event {
            step: solution.steps,
            time: end,
            snapshot: current.clone(),
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            solution.status = Status::StoppedByObserver;
            return Ok(solution);
        }
    }

    Ok(solution)
}

/// Integrates an ODE problem using Dormand–Prince without observation.
///
/// This is a convenience wrapper around [`solve`] that discards events.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_unobserved<M, P>(
    model: &M,
    problem: &P,
    initial: M::Input,
    times: &[f64],
    config: &Config,
) -> Result<Solution<M::Input, M::Output>, Error>
where
    M: Model,
    M::Input: Clone,
    M::Output: Clone,
    P: OdeProblem<Input = M::Input, Output = M::Output, Delta = f64>,
    P::State: FlatState,
    DerivativeOf<P::State, f64>: FlatState,
{
    solve(model, problem, initial, times, config, ())
}

/// The unfinalized input at the end of an interval and the steps it took.
struct Reached<I> {
    input: I,
    accepted: usize,
    rejected: usize,
}

/// Integrates from the `current` snapshot at `start` up to `end`.
fn advance<M, P>(
    model: &M,
    problem: &P,
    current: &Snapshot<M::Input, M::Output>,
    start: f64,
    end: f64,
    config: &Config,
) -> Result<Reached<M::Input>, Error>
where
    M: Model,
    P: OdeProblem<Input = M::Input, Output = M::Output, Delta = f64>,
    P::State: FlatState,
    DerivativeOf<P::State, f64>: FlatState,
{
    let state = problem.state(&current.input).map_err(Error::problem)?;
    let y_start = DVector::from_column_slice(state.components());

    let failure = Rc::new(RefCell::new(None));
    let latest = Rc::new(RefCell::new(None));
    let system = Interval {
        model,
        problem,
        base: &current.input,
        start,
        failure: Rc::clone(&failure),
        latest: Rc::clone(&latest),
    };

    let mut stepper = ode_solvers::Dopri5::new(
        system,
        start,
        end,
        end - start,
        y_start,
        config.rel_tol(),
        config.abs_tol(),
    );
    let outcome = stepper.integrate();

    if let Some(err) = failure.borrow_mut().take() {
        return Err(err);
    }
    let stats = outcome?;

    let recorded = latest.borrow_mut().take();
    let (time, y) = match recorded {
        Some(last) => last,
        None => match (stepper.x_out().last(), stepper.y_out().last()) {
            (Some(&x), Some(y)) => (x, y.clone()),
            _ => return Err(Error::Incomplete { time: start }),
        },
    };
    if (time - end).abs() > 1e-9 * end.abs().max(1.0) {
        return Err(Error::Incomplete { time });
    }

    let state = P::State::from_components(y.as_slice().to_vec());
    let input = problem
        .build_input(&current.input, &state, &(end - start))
        .map_err(Error::problem)?;

    Ok(Reached {
        input,
        accepted: usize::try_from(stats.accepted_steps).unwrap_or(usize::MAX),
        rejected: usize::try_from(stats.rejected_steps).unwrap_or(usize::MAX),
    })
}

/// Adapts a model and problem into an [`ode_solvers`] system for one interval.
///
/// The solver state is the flattened [`OdeProblem::State`]. Inputs are rebuilt
/// from `base`, offset by the time elapsed since `start`.
struct Interval<'a, M: Model, P> {
    model: &'a M,
    problem: &'a P,
    base: &'a M::Input,
    start: f64,
    failure: Rc<RefCell<Option<Error>>>,
    latest: Rc<RefCell<Option<(f64, DVector<f64>)>>>,
}

impl<M, P> Interval<'_, M, P>
where
    M: Model,
    P: OdeProblem<Input = M::Input, Output = M::Output, Delta = f64>,
    P::State: FlatState,
    DerivativeOf<P::State, f64>: FlatState,
{
    fn derivative(&self, x: f64, y: &DVector<f64>) -> Result<Vec<f64>, Error> {
        let state = P::State::from_components(y.as_slice().to_vec());
        let input = self
            .problem
            .build_input(self.base, &state, &(x - self.start))
            .map_err(Error::problem)?;
        let output = self.model.call(&input).map_err(Error::model)?;
        let derivative = self
            .problem
            .derivative(&input, &output)
            .map_err(Error::problem)?;
        Ok(derivative.components().to_vec())
    }
}

impl<M, P> System<f64, DVector<f64>> for Interval<'_, M, P>
where
    M: Model,
    P: OdeProblem<Input = M::Input, Output = M::Output, Delta = f64>,
    P::State: FlatState,
    DerivativeOf<P::State, f64>: FlatState,
{
    fn system(&self, x: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        match self.derivative(x, y) {
            Ok(rates) => dy.copy_from_slice(&rates),
            Err(err) => {
                let mut failure = self.failure.borrow_mut();
                if failure.is_none() {
                    *failure = Some(err);
                }
                dy.fill(f64::NAN);
            }
        }
    }

    fn solout(&mut self, x: f64, y: &DVector<f64>, _dy: &DVector<f64>) -> bool {
        *self.latest.borrow_mut() = Some((x, y.clone()));

        // Stop as soon as a model or problem call has failed.
        self.failure.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::transient::test_utils::{Decay, DecayInput, DecayProblem, Level};

    fn initial() -> DecayInput {
        DecayInput {
            time: 0.0,
            level: Level(1.0),
        }
    }

    #[test]
    fn matches_exponential_decay_at_grid_times() {
        let times: Vec<f64> = (0..=10).map(|i| f64::from(i) * 0.5).collect();

        let solution = solve_unobserved(
            &Decay { rate: 2.0 },
            &DecayProblem,
            initial(),
            &times,
            &Config::default(),
        )
        .expect("should solve");

        assert_eq!(solution.status, Status::Complete);
        assert_eq!(solution.times, times);
        for (time, snapshot) in times.iter().zip(&solution.history) {
            assert_relative_eq!(snapshot.input.time, *time, epsilon = 1e-9);
            assert_relative_eq!(
                snapshot.input.level.0,
                (-2.0 * time).exp(),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn counts_steps_across_intervals() {
        let solution = solve_unobserved(
            &Decay { rate: 1.0 },
            &DecayProblem,
            initial(),
            &[0.0, 5.0, 10.0],
            &Config::new(1e-6, 1e-6).unwrap(),
        )
        .expect("should solve");

        assert!(solution.steps >= 2);
        assert!(solution.steps < 400, "took {} steps", solution.steps);
        assert_relative_eq!(
            solution.history[2].input.level.0,
            (-10.0_f64).exp(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn observer_sees_each_grid_time() {
        let mut seen = Vec::new();

        let solution = solve(
            &Decay { rate: 1.0 },
            &DecayProblem,
            initial(),
            &[0.0, 1.0, 2.0],
            &Config::default(),
            |event: &Event<DecayInput, f64>| {
                seen.push(event.time);
                None
            },
        )
        .expect("should solve");

        assert_eq!(seen, vec![0.0, 1.0, 2.0]);
        assert_eq!(solution.history.len(), 3);
    }

    #[test]
    fn observer_can_stop_early() {
        let solution = solve(
            &Decay { rate: 1.0 },
            &DecayProblem,
            initial(),
            &[0.0, 1.0, 2.0, 3.0],
            &Config::default(),
            |event: &Event<DecayInput, f64>| (event.time >= 1.0).then_some(Action::StopEarly),
        )
        .expect("should solve");

        assert_eq!(solution.status, Status::StoppedByObserver);
        assert_eq!(solution.times, vec![0.0, 1.0]);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("level dropped below {0}")]
    struct BelowFloor(f64);

    /// Decay that refuses to evaluate once the level falls below a floor.
    struct Floored {
        floor: f64,
    }

    impl Model for Floored {
        type Input = DecayInput;
        type Output = f64;
        type Error = BelowFloor;

        fn call(&self, input: &DecayInput) -> Result<f64, BelowFloor> {
            if input.level.0 < self.floor {
                return Err(BelowFloor(self.floor));
            }
            Ok(-input.level.0)
        }
    }

    #[test]
    fn model_errors_stop_the_run() {
        let result = solve_unobserved(
            &Floored { floor: 0.5 },
            &DecayProblem,
            initial(),
            &[0.0, 0.25, 2.0],
            &Config::default(),
        );

        assert!(matches!(result, Err(Error::Model(_))));
    }
}
