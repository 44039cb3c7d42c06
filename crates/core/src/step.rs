/// A trait for types that can be stepped using their derivative.
///
/// Implementing this trait lets a solver advance the type by
/// `derivative * delta`, where the derivative is taken with respect to
/// `Delta`. For compartmental models `Delta` is simulated time in years.
pub trait StepIntegrable<Delta> {
    /// The derivative of the type with respect to `Delta`.
    type Derivative;

    /// Returns the value after stepping with a derivative and step size.
    #[must_use]
    fn step(&self, derivative: Self::Derivative, delta: Delta) -> Self;
}

/// Type alias for the derivative of a `StepIntegrable` type.
pub type DerivativeOf<T, Delta> = <T as StepIntegrable<Delta>>::Derivative;

/// A state or derivative that can be viewed as a flat vector of `f64`.
///
/// Adaptive integrators from `ode_solvers` work on a dense vector, so states
/// and derivatives are handed over as their flat components.
pub trait FlatState: Sized {
    /// Returns the components in a fixed order.
    fn components(&self) -> &[f64];

    /// Rebuilds a value from components in the order of [`components`](Self::components).
    fn from_components(components: Vec<f64>) -> Self;
}
