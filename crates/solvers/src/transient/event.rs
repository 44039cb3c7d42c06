use strata_core::Snapshot;

/// Event emitted by a transient solver as it advances.
///
/// Step 0 is the initial state before any integration. Euler also reports its
/// internal steps between grid points, so `time` is not necessarily a grid time.
#[derive(Debug, Clone)]
pub struct Event<I, O> {
    /// The number of accepted steps so far (0 for the initial state).
    pub step: usize,

    /// The independent variable at this snapshot.
    pub time: f64,

    /// Snapshot of the model input and output after the step.
    pub snapshot: Snapshot<I, O>,
}
