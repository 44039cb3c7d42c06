//! Forward Euler solver sampled on a time grid.
//!
//! Between consecutive grid times the solver takes equal explicit steps:
//!
//! ```text
//! state_{n+1} = state_n + derivative_n * dt
//! ```
//!
//! with `dt` the largest value not above [`Config::max_step`] that divides the
//! interval evenly, so every grid time is hit exactly.
//!
//! # Example
//!
//! ```ignore
//! use strata_solvers::transient::euler;
//!
//! let solution = euler::solve_unobserved(&model, &problem, initial, &times, &euler::Config::default())?;
//!
//! for (time, snapshot) in solution.times.iter().zip(&solution.history) {
//!     println!("t={time}: {:?}", snapshot.output);
//! }
//! ```

mod config;

pub use config::{Config, ConfigError};

use strata_core::{Model, Observer, OdeProblem, Snapshot, StepIntegrable};

use super::{Action, Error, Event, Solution, Status, grid};

/// Integrates an ODE problem over `times` using forward Euler.
///
/// `initial` must be the model input at `times[0]`.
///
/// # Algorithm
///
/// 1. Call the model with the initial input to get the initial snapshot.
/// 2. For each interval between grid times, split it into `n` equal steps and
///    for each step:
///    - Extract the state and derivative from the current snapshot.
///    - Step the state forward: `state + derivative * dt`.
///    - Build and finalize the next input, then call the model.
///    - Emit an [`Event`] to the observer.
/// 3. Record the snapshot reached at the end of each interval.
///
/// # Observer
///
/// The observer may return [`Action::StopEarly`] after any step to end the
/// run with the grid samples collected so far.
///
/// # Errors
///
/// Returns an error if the grid is invalid, or if the model or problem
/// returns an error at any point.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
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
    Obs: Observer<Event<M::Input, M::Output>, Action>,
{
    grid::validate(times)?;

    // Evaluate initial state.
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

    for pair in times.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let substeps = ((end - start) / config.max_step()).ceil().max(1.0) as usize;
        let dt = (end - start) / substeps as f64;

        for substep in 1..=substeps {
            let state = problem.state(&current.input).map_err(Error::problem)?;
            let derivative = problem
                .derivative(&current.input, &current.output)
                .map_err(Error::problem)?;

            let next_state = state.step(derivative, dt);

            let next_input = problem
                .build_input(&current.input, &next_state, &dt)
                .map_err(Error::problem)?;
            let next_input = problem
                .finalize_step(next_input, &current.input, &current.output, &dt)
                .map_err(Error::problem)?;

            let next_output = model.call(&next_input).map_err(Error::model)?;
            current = Snapshot::new(next_input, next_output);
            solution.steps += 1;

            let time = if substep == substeps {
                end
            } else {
                start + dt * substep as f64
            };
            let event = Event {
                step: solution.steps,
                time,
                snapshot: current.clone(),
            };
            if let Some(Action::StopEarly) = observer.observe(&event) {
                solution.status = Status::StoppedByObserver;
                return Ok(solution);
            }
        }

        solution.times.push(end);
        solution.history.push(current.clone());
    }

    Ok(solution)
}

/// Integrates an ODE problem using forward Euler without observation.
///
/// This is a convenience wrapper around [`solve`] that discards events.
///
/// # Errors
///
/// Returns an error if the grid is invalid, or if the model or problem
/// returns an error at any point.
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
{
    solve(model, problem, initial, times, config, ())
}
