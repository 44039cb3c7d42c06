//! Model definitions loaded from TOML or JSON.
//!
//! A [`ModelConfig`] describes a base model, the stratifications to apply to
//! it in order, and optionally how to run it:
//!
//! ```toml
//! compartments = ["susceptible", "infectious"]
//! starting_population = 1000.0
//! seeds = { infectious = 1.0 }
//!
//! [parameters]
//! contact_rate = 20.0
//! recovery = 0.333
//!
//! [[flows]]
//! type = "infection_frequency"
//! parameter = "contact_rate"
//! origin = "susceptible"
//! to = "infectious"
//!
//! [[stratifications]]
//! name = "age"
//! kind = "age"
//! breakpoints = [5.0, 15.0]
//!
//! [run]
//! times = { start = 0.0, end = 50.0, step = 0.5 }
//! integrator = { method = "dopri5", rel_tol = 1e-6 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_solvers::transient::{dopri5, euler};
use thiserror::Error;

use crate::{
    Adjustment, BirthApproach, CompartmentalModel, EntryProportion, Flow, Integrator, Outputs,
    ParameterValue, RemainderPolicy, RunError, Stratification, StructuralError,
};

/// Errors raised while loading or applying a [`ModelConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("could not parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("invalid Euler settings: {0}")]
    Euler(#[from] euler::ConfigError),

    #[error("invalid Dormand–Prince settings: {0}")]
    Dopri5(#[from] dopri5::ConfigError),

    #[error("invalid time grid: {0}")]
    TimeGrid(&'static str),

    #[error("the configuration has no run section")]
    MissingRun,

    #[error(transparent)]
    Run(#[from] RunError),
}

/// A complete model definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub compartments: Vec<String>,
    pub starting_population: f64,
    #[serde(default)]
    pub seeds: BTreeMap<String, f64>,
    #[serde(default)]
    pub remainder_compartment: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub birth_approach: BirthApproach,
    #[serde(default)]
    pub entry_compartment: Option<String>,
    #[serde(default)]
    pub infectious_compartments: Option<Vec<String>>,
    #[serde(default)]
    pub stratifications: Vec<StratificationConfig>,
    #[serde(default)]
    pub run: Option<RunConfig>,
}

/// The kind of a configured stratification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindConfig {
    #[default]
    General,
    Strain,
    Age,
}

/// One stratification of a [`ModelConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratificationConfig {
    pub name: String,
    #[serde(default)]
    pub kind: KindConfig,
    /// Ignored for age stratifications, whose strata come from `breakpoints`.
    #[serde(default)]
    pub strata: Vec<String>,
    #[serde(default)]
    pub breakpoints: Vec<f64>,
    #[serde(default)]
    pub compartments: Vec<String>,
    #[serde(default)]
    pub adjustments: BTreeMap<String, BTreeMap<String, Adjustment>>,
    #[serde(default)]
    pub infectiousness: BTreeMap<String, f64>,
    #[serde(default)]
    pub proportions: BTreeMap<String, f64>,
    #[serde(default)]
    pub remainder: RemainderPolicy,
    #[serde(default)]
    pub entry_proportions: BTreeMap<String, EntryProportion>,
}

/// Output times and solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub times: TimeGrid,
    #[serde(default)]
    pub integrator: IntegratorConfig,
}

/// Output times, listed or generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeGrid {
    Points(Vec<f64>),
    /// `points` evenly spaced times from `start` to `end` inclusive.
    Linspace { start: f64, end: f64, points: usize },
    /// Times from `start` to `end` inclusive, `step` apart.
    Range { start: f64, end: f64, step: f64 },
}

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum IntegratorConfig {
    Euler {
        #[serde(default = "default_euler_step")]
        max_step: f64,
    },
    Dopri5 {
        #[serde(default = "default_abs_tol")]
        abs_tol: f64,
        #[serde(default = "default_rel_tol")]
        rel_tol: f64,
    },
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self::Dopri5 {
            abs_tol: default_abs_tol(),
            rel_tol: default_rel_tol(),
        }
    }
}

fn default_euler_step() -> f64 {
    euler::Config::default().max_step()
}

fn default_abs_tol() -> f64 {
    dopri5::Config::default().abs_tol()
}

fn default_rel_tol() -> f64 {
    dopri5::Config::default().rel_tol()
}

impl ModelConfig {
    /// Parses a TOML definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid definition.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parses a JSON definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid definition.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the base model and applies every stratification in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is structurally invalid.
    pub fn build(&self) -> Result<CompartmentalModel, ConfigError> {
        let mut model = CompartmentalModel::new(self.compartments.iter().cloned())?;

        if let Some(remainder) = &self.remainder_compartment {
            model.set_remainder_compartment(remainder)?;
        }
        model.set_initial_population(
            self.starting_population,
            self.seeds.iter().map(|(name, &value)| (name, value)),
        )?;

        for (name, value) in &self.parameters {
            model.add_parameter(name.clone(), value.clone());
        }
        for flow in &self.flows {
            model.add_transition_flow(flow.clone())?;
        }
        if let Some(infectious) = &self.infectious_compartments {
            model.set_infectious_compartments(infectious.iter().cloned())?;
        }
        model.set_birth_approach(self.birth_approach.clone());
        if let Some(entry) = &self.entry_compartment {
            model.set_entry_compartment(entry)?;
        }

        for stratification in &self.stratifications {
            model = model.stratify(&stratification.to_stratification())?;
        }
        Ok(model)
    }

    /// The configured output times.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no run section or the grid is invalid.
    pub fn times(&self) -> Result<Vec<f64>, ConfigError> {
        self.run.as_ref().ok_or(ConfigError::MissingRun)?.times.to_times()
    }

    /// The configured solver.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no run section or the settings are invalid.
    pub fn integrator(&self) -> Result<Integrator, ConfigError> {
        self.run
            .as_ref()
            .ok_or(ConfigError::MissingRun)?
            .integrator
            .to_integrator()
    }

    /// Builds the model and runs it as configured.
    ///
    /// # Errors
    ///
    /// Returns an error if building, configuring or running the model fails.
    pub fn run(&self) -> Result<Outputs, ConfigError> {
        let model = self.build()?;
        Ok(model.run(&self.times()?, &self.integrator()?)?)
    }
}

impl StratificationConfig {
    /// The stratification request this entry describes.
    #[must_use]
    pub fn to_stratification(&self) -> Stratification {
        let mut request = match self.kind {
            KindConfig::General => Stratification::new(self.name.clone(), self.strata.iter().cloned()),
            KindConfig::Strain => {
                Stratification::strain(self.name.clone(), self.strata.iter().cloned())
            }
            KindConfig::Age => {
                let mut age = Stratification::age(self.breakpoints.iter().copied());
                age.name.clone_from(&self.name);
                age
            }
        }
        .compartments(self.compartments.iter().cloned())
        .remainder_policy(self.remainder.clone());

        for (parameter, by_stratum) in &self.adjustments {
            for (stratum, adjustment) in by_stratum {
                request = request.adjust(parameter.clone(), stratum.clone(), adjustment.clone());
            }
        }
        for (stratum, &weight) in &self.infectiousness {
            request = request.infectiousness(stratum.clone(), weight);
        }
        for (stratum, &proportion) in &self.proportions {
            request = request.proportion(stratum.clone(), proportion);
        }
        for (stratum, proportion) in &self.entry_proportions {
            request = request.entry_proportion(stratum.clone(), proportion.clone());
        }
        request
    }
}

impl TimeGrid {
    /// Expands the grid into output times.
    ///
    /// # Errors
    ///
    /// Returns an error if a generated grid has a non-positive step, fewer than
    /// two points, or an end before its start.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_times(&self) -> Result<Vec<f64>, ConfigError> {
        match *self {
            Self::Points(ref times) => Ok(times.clone()),
            Self::Linspace { start, end, points } => {
                if points < 2 {
                    return Err(ConfigError::TimeGrid("a linspace needs at least two points"));
                }
                if !(end > start) {
                    return Err(ConfigError::TimeGrid("end must come after start"));
                }
                let step = (end - start) / (points - 1) as f64;
                Ok((0..points)
                    .map(|i| if i + 1 == points { end } else { start + step * i as f64 })
                    .collect())
            }
            Self::Range { start, end, step } => {
                if !step.is_finite() || step <= 0.0 {
                    return Err(ConfigError::TimeGrid("step must be finite and positive"));
                }
                if !(end > start) {
                    return Err(ConfigError::TimeGrid("end must come after start"));
                }
                let intervals = ((end - start) / step - 1e-9).ceil() as usize;
                Ok((0..=intervals)
                    .map(|i| if i == intervals { end } else { start + step * i as f64 })
                    .collect())
            }
        }
    }
}

impl IntegratorConfig {
    /// Validates the settings into an [`Integrator`].
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance or step is out of range.
    pub fn to_integrator(&self) -> Result<Integrator, ConfigError> {
        match *self {
            Self::Euler { max_step } => Ok(Integrator::Euler(euler::Config::new(max_step)?)),
            Self::Dopri5 { abs_tol, rel_tol } => {
                Ok(Integrator::Dopri5(dopri5::Config::new(abs_tol, rel_tol)?))
            }
        }
    }
}
