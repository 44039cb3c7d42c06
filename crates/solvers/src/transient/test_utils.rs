//! Exponential decay `y' = -rate * y`, shared by the solver tests.

use std::convert::Infallible;

use strata_core::{FlatState, Model, OdeProblem, StepIntegrable};

pub(crate) struct Decay {
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Level(pub f64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Trend(pub f64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DecayInput {
    pub time: f64,
    pub level: Level,
}

impl Model for Decay {
    type Input = DecayInput;
    type Output = f64;
    type Error = Infallible;

    fn call(&self, input: &DecayInput) -> Result<f64, Infallible> {
        Ok(-self.rate * input.level.0)
    }
}

pub(crate) struct DecayProblem;

impl OdeProblem for DecayProblem {
    type Input = DecayInput;
    type Output = f64;
    type Delta = f64;
    type State = Level;
    type Error = Infallible;

    fn state(&self, input: &DecayInput) -> Result<Level, Infallible> {
        Ok(input.level)
    }

    fn derivative(&self, _input: &DecayInput, output: &f64) -> Result<Trend, Infallible> {
        Ok(Trend(*output))
    }

    fn build_input(
        &self,
        base: &DecayInput,
        state: &Level,
        delta: &f64,
    ) -> Result<DecayInput, Infallible> {
        Ok(DecayInput {
            time: base.time + delta,
            level: *state,
        })
    }
}

impl StepIntegrable<f64> for Level {
    type Derivative = Trend;

    fn step(&self, derivative: Trend, delta: f64) -> Self {
        Level(self.0 + derivative.0 * delta)
    }
}

impl FlatState for Level {
    fn components(&self) -> &[f64] {
        std::slice::from_ref(&self.0)
    }

    fn from_components(components: Vec<f64>) -> Self {
        Level(components[0])
    }
}

impl FlatState for Trend {
    fn components(&self) -> &[f64] {
        std::slice::from_ref(&self.0)
    }

    fn from_components(components: Vec<f64>) -> Self {
        Trend(components[0])
    }
}
