use crate::{DerivativeOf, StepIntegrable};

/// Adapts a [`Model`](crate::Model) to an ordinary differential equation.
///
/// The model computes something from an input (for a compartmental model, the
/// flow rates at a point in time). The problem says which part of that input
/// is the integrated state, which part of the output is its derivative, and
/// how to rebuild an input once the state has moved on.
///
/// Integrators only ever talk to a model through its problem, so the same
/// model can be integrated by any solver in `strata-solvers`.
pub trait OdeProblem {
    type Input;
    type Output;
    type Delta;
    type State: StepIntegrable<Self::Delta>;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Extracts the integrated state from a model input.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the state cannot be extracted from the input.
    fn state(&self, input: &Self::Input) -> Result<Self::State, Self::Error>;

    /// Extracts the state derivative from a model input and its output.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the derivative cannot be computed.
    fn derivative(
        &self,
        input: &Self::Input,
        output: &Self::Output,
    ) -> Result<DerivativeOf<Self::State, Self::Delta>, Self::Error>;

    /// Builds the model input for `state`, located `delta` past `base`.
    ///
    /// Multi-stage integrators call this for trial states that may never be
    /// accepted, so it must not have side effects.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the input cannot be constructed from the state.
    fn build_input(
        &self,
        base: &Self::Input,
        state: &Self::State,
        delta: &Self::Delta,
    ) -> Result<Self::Input, Self::Error>;

    /// Finalizes an input after the solver accepts a step.
    ///
    /// Called once per accepted step, never for trial stages. This is where a
    /// problem enforces constraints the continuous equations only guarantee in
    /// the limit, such as non-negative populations.
    ///
    /// The default implementation returns the input unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if finalization fails.
    fn finalize_step(
        &self,
        next_input: Self::Input,
        _prev_input: &Self::Input,
        _prev_output: &Self::Output,
        _step_delta: &Self::Delta,
    ) -> Result<Self::Input, Self::Error> {
        Ok(next_input)
    }
}
