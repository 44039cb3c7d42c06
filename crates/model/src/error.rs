use strata_functions::CurveError;
use thiserror::Error;

/// A structural request that would leave the model inconsistent.
///
/// Raised before anything is changed, so the model a failed request was made
/// against is still valid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructuralError {
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("compartment {0:?} is declared more than once")]
    DuplicateCompartment(String),

    #[error("unknown compartment {0:?}")]
    UnknownCompartment(String),

    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),

    #[error("stratification {0:?} needs at least one stratum")]
    NoStrata(String),

    #[error("stratum {stratum:?} appears more than once in stratification {stratification:?}")]
    DuplicateStratum {
        stratification: String,
        stratum: String,
    },

    #[error("stratification {stratification:?} has no stratum {stratum:?}")]
    UnknownStratum {
        stratification: String,
        stratum: String,
    },

    #[error("stratification {0:?} has already been applied")]
    AlreadyStratified(String),

    #[error("stratification {requested:?} cannot split strains; {existing:?} already does")]
    SecondStrainStratification { existing: String, requested: String },

    #[error("age breakpoints must be finite, non-negative and distinct")]
    InvalidBreakpoints,

    #[error("proportion {value} for stratum {stratum:?} must lie in [0, 1]")]
    InvalidProportion { stratum: String, value: f64 },

    #[error("requested proportions sum to {0}, above 1")]
    ProportionsExceedOne(f64),

    #[error("every stratum has a requested proportion but they sum to {0}, not 1")]
    ProportionsIncomplete(f64),

    #[error("entry proportions sum to {0}, above 1")]
    EntryProportionsExceedOne(f64),

    #[error("every stratum has an entry proportion but they sum to {0}, not 1")]
    EntryProportionsIncomplete(f64),

    #[error(
        "stratification {stratification:?} takes entry proportions from parameters, \
         so stratum {stratum:?} needs one too"
    )]
    EntryProportionMissing {
        stratification: String,
        stratum: String,
    },

    #[error("the remainder prior has no positive weight for the unspecified strata")]
    EmptyPrior,

    #[error("infectiousness weight {value} for stratum {stratum:?} must be finite and non-negative")]
    InvalidWeight { stratum: String, value: f64 },

    #[error("parameter {0:?} would be bound to two different values by one stratification")]
    ConflictingParameter(String),

    #[error("population {value} for {compartment:?} must be finite and non-negative")]
    InvalidPopulation { compartment: String, value: f64 },

    #[error("seeded populations sum to {seeded}, above the starting population {total}")]
    SeedsExceedPopulation { seeded: f64, total: f64 },
}

/// A parameter that could not be resolved to a rate.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("unknown parameter {0:?}")]
    Unknown(String),

    #[error("parameter {0:?} refers to itself through its parents")]
    Cycle(String),

    #[error("parameter {name:?} could not be evaluated: {source}")]
    Curve {
        name: String,
        #[source]
        source: CurveError,
    },

    #[error(
        "entry proportions of stratification {stratification:?} must be finite, \
         non-negative and not all zero (sum {sum})"
    )]
    EntryProportions { stratification: String, sum: f64 },
}

/// A failed simulation run. Failed runs produce no outputs.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("integration failed: {0}")]
    Solver(#[from] strata_solvers::transient::Error),
}

/// A query against run outputs that cannot be answered.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OutputError {
    #[error("no compartment matches {0:?}")]
    UnknownCompartment(String),

    #[error("time {0} is not on the output grid")]
    TimeNotInGrid(f64),
}

/// A failed calibration-facing evaluation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
