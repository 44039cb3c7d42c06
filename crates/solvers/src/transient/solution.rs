use strata_core::Snapshot;

/// Indicates how the solver terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Reached the final grid time.
    Complete,

    /// Stopped early due to an observer action.
    StoppedByObserver,
}

/// The result of integrating over a time grid.
#[derive(Debug, Clone)]
pub struct Solution<I, O> {
    /// How the solver terminated.
    pub status: Status,

    /// The grid times that were reached, starting with the initial time.
    pub times: Vec<f64>,

    /// One snapshot per entry of `times`.
    pub history: Vec<Snapshot<I, O>>,

    /// Number of accepted integration steps.
    pub steps: usize,

    /// Number of rejected trial steps (always zero for fixed-step solvers).
    pub rejected: usize,
}
