//! Stratified compartmental epidemic models.
//!
//! A [`CompartmentalModel`] starts as a handful of named compartments joined
//! by [`Flow`]s whose rates are named parameters. Each call to
//! [`CompartmentalModel::stratify`] splits compartments along one more
//! dimension (age, strain, organ involvement, vaccination) and returns the
//! larger model, cloning and re-parameterising every flow it touches. A
//! finished model is compiled into [`Dynamics`] and integrated by one of the
//! `strata-solvers` integrators with [`CompartmentalModel::run`], producing
//! [`Outputs`] sampled on the requested time grid.
//!
//! ```
//! use strata_model::{Adjustment, CompartmentalModel, Flow, Integrator, Stratification};
//!
//! let mut model = CompartmentalModel::new(["susceptible", "infectious"]).unwrap();
//! model.set_initial_population(1000.0, [("infectious", 1.0)]).unwrap();
//! model.add_parameter("contact_rate", 20.0);
//! model.add_parameter("recovery", 1.0 / 3.0);
//! model
//!     .add_transition_flow(Flow::infection_frequency("contact_rate", "susceptible", "infectious"))
//!     .unwrap();
//! model
//!     .add_transition_flow(Flow::transition("recovery", "infectious", "susceptible"))
//!     .unwrap();
//!
//! let model = model
//!     .stratify(
//!         &Stratification::age([15.0])
//!             .adjust("recovery", "0", Adjustment::Multiply(2.0))
//!             .infectiousness("0", 0.5),
//!     )
//!     .unwrap();
//!
//! let outputs = model.run(&[0.0, 10.0, 20.0], &Integrator::default()).unwrap();
//! let infectious = outputs.total_compartment_size(&["infectious"]).unwrap();
//! assert!(infectious[2] > infectious[0]);
//! ```

mod birth;
mod calibration;
mod config;
mod error;
mod flow;
mod flowchart;
mod model;
mod outputs;
mod parameter;
mod run;
mod stratification;
mod stratify;

pub mod dynamics;
pub mod naming;

pub use birth::BirthApproach;
pub use calibration::{Evaluation, Target};
pub use config::{
    ConfigError, IntegratorConfig, KindConfig, ModelConfig, RunConfig, StratificationConfig,
    TimeGrid,
};
pub use dynamics::{Dynamics, NumericalWarning};
pub use error::{EvaluationError, OutputError, ParameterError, RunError, StructuralError};
pub use flow::{Exit, Flow, Infection, Transition};
pub use flowchart::{FlowEdge, Flowchart, StructureExport};
pub use model::{
    BACKGROUND_DEATH_PARAMETER, Compartment, CompartmentalModel, DEFAULT_ENTRY_COMPARTMENT,
    DEFAULT_INFECTIOUS_COMPARTMENT, DEFAULT_REMAINDER_COMPARTMENT, StratificationRecord,
};
pub use outputs::{OutputRecord, Outputs};
pub use parameter::{Adjustment, ParameterValue};
pub use run::Integrator;
pub use stratification::{EntryProportion, RemainderPolicy, Stratification, StratificationKind};
