use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    BirthApproach, EntryProportion, Flow, ParameterError, ParameterValue, StratificationKind,
    StructuralError, naming, parameter,
};

/// Parameter used for background mortality unless a stratum adjusts it.
pub const BACKGROUND_DEATH_PARAMETER: &str = "universal_death_rate";

/// Compartment that absorbs the unseeded population by default.
pub const DEFAULT_REMAINDER_COMPARTMENT: &str = "susceptible";

/// Compartment receiving births by default.
pub const DEFAULT_ENTRY_COMPARTMENT: &str = "susceptible";

/// Compartments counted in the force of infection by default.
pub const DEFAULT_INFECTIOUS_COMPARTMENT: &str = "infectious";

/// A named population bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compartment {
    pub name: String,

    /// Population at the start of a run.
    pub population: f64,

    /// Product of the infectiousness weights of every stratum the compartment
    /// belongs to. Only used if the compartment is infectious.
    pub infectiousness: f64,

    /// Parameter giving the background death rate.
    pub death_parameter: String,
}

/// What one applied stratification did to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratificationRecord {
    pub name: String,
    pub kind: StratificationKind,
    pub strata: Vec<String>,

    /// The compartments that were split, named as they were before the split.
    pub compartments: Vec<String>,

    /// Population share of each stratum, in stratum order.
    pub proportions: Vec<f64>,

    /// Infectiousness weight of each stratum, in stratum order.
    pub infectiousness: Vec<f64>,

    /// Birth share of each stratum, in stratum order.
    pub entry_proportions: Vec<EntryProportion>,

    /// Parameters created for stratum-specific rates.
    pub parameters: Vec<String>,
}

/// A compartmental model: compartments, flows between them and the
/// parameters that set their rates.
///
/// The base model is assembled with the registry methods. Stratifying it with
/// [`stratify`](Self::stratify) returns a larger model and leaves the original
/// untouched, and running it never changes its structure.
///
/// ```
/// use strata_model::{CompartmentalModel, Flow};
///
/// let mut sis = CompartmentalModel::new(["susceptible", "infectious"]).unwrap();
/// sis.set_initial_population(1000.0, [("infectious", 10.0)]).unwrap();
/// sis.add_parameter("contact_rate", 20.0);
/// sis.add_parameter("recovery", 1.0 / 3.0);
/// sis.add_transition_flow(Flow::infection_frequency("contact_rate", "susceptible", "infectious"))
///     .unwrap();
/// sis.add_transition_flow(Flow::transition("recovery", "infectious", "susceptible"))
///     .unwrap();
///
/// assert_eq!(sis.total_population(), 1000.0);
/// assert_eq!(sis.compartments()[0].population, 990.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CompartmentalModel {
    pub(crate) compartments: Vec<Compartment>,
    pub(crate) flows: Vec<Flow>,
    pub(crate) parameters: BTreeMap<String, ParameterValue>,
    pub(crate) infectious: Vec<String>,
    pub(crate) birth_approach: BirthApproach,
    pub(crate) entry_compartment: String,
    pub(crate) remainder_compartment: String,
    pub(crate) strain: Option<String>,
    pub(crate) history: Vec<StratificationRecord>,
}

impl CompartmentalModel {
    /// Creates an unstratified model with empty compartments.
    ///
    /// The background death parameter is added with a rate of zero.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is empty, contains the stratification
    /// delimiter, or is repeated.
    pub fn new<S: Into<String>>(
        compartments: impl IntoIterator<Item = S>,
    ) -> Result<Self, StructuralError> {
        let mut names: Vec<String> = Vec::new();
        for name in compartments {
            let name = name.into();
            naming::validate_base(&name)?;
            if names.contains(&name) {
                return Err(StructuralError::DuplicateCompartment(name));
            }
            names.push(name);
        }

        Ok(Self {
            compartments: names
                .into_iter()
                .map(|name| Compartment {
                    name,
                    population: 0.0,
                    infectiousness: 1.0,
                    death_parameter: BACKGROUND_DEATH_PARAMETER.to_owned(),
                })
                .collect(),
            flows: Vec::new(),
            parameters: BTreeMap::from([(
                BACKGROUND_DEATH_PARAMETER.to_owned(),
                ParameterValue::Constant(0.0),
            )]),
            infectious: vec![DEFAULT_INFECTIOUS_COMPARTMENT.to_owned()],
            birth_approach: BirthApproach::NoBirths,
            entry_compartment: DEFAULT_ENTRY_COMPARTMENT.to_owned(),
            remainder_compartment: DEFAULT_REMAINDER_COMPARTMENT.to_owned(),
            strain: None,
            history: Vec::new(),
        })
    }

    /// Sets initial populations from seeds, with the remainder compartment
    /// absorbing whatever the seeds leave of `total`.
    ///
    /// Compartments that are neither seeded nor the remainder start empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a seed names an unknown compartment, a value is
    /// negative or not finite, or the seeds exceed `total`.
    pub fn set_initial_population<K: AsRef<str>>(
        &mut self,
        total: f64,
        seeds: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<(), StructuralError> {
        check_population(&self.remainder_compartment, total)?;
        let remainder = self.index_of(&self.remainder_compartment)?;

        let mut populations = vec![0.0; self.compartments.len()];
        for (name, value) in seeds {
            let name = name.as_ref();
            check_population(name, value)?;
            populations[self.index_of(name)?] += value;
        }

        let seeded: f64 = populations.iter().sum();
        if seeded > total {
            return Err(StructuralError::SeedsExceedPopulation { seeded, total });
        }
        populations[remainder] += total - seeded;

        for (compartment, population) in self.compartments.iter_mut().zip(populations) {
            compartment.population = population;
        }
        Ok(())
    }

    /// Chooses the compartment that absorbs the unseeded population.
    ///
    /// # Errors
    ///
    /// Returns an error if no compartment has this name.
    pub fn set_remainder_compartment(&mut self, name: &str) -> Result<(), StructuralError> {
        self.index_of(name)?;
        self.remainder_compartment = name.to_owned();
        Ok(())
    }

    /// Adds a flow after checking that its endpoints exist.
    ///
    /// The flow's parameter is resolved when the model runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin or destination is not a compartment.
    pub fn add_transition_flow(&mut self, flow: Flow) -> Result<(), StructuralError> {
        self.index_of(flow.origin())?;
        if let Some(destination) = flow.destination() {
            self.index_of(destination)?;
        }
        self.flows.push(flow);
        Ok(())
    }

    /// Binds `name` to a value, replacing any previous binding.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Chooses the compartments counted in the force of infection.
    ///
    /// # Errors
    ///
    /// Returns an error if a name selects no compartment.
    pub fn set_infectious_compartments<S: Into<String>>(
        &mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<(), StructuralError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            self.select(name)?;
        }
        self.infectious = names;
        Ok(())
    }

    pub fn set_birth_approach(&mut self, approach: BirthApproach) {
        self.birth_approach = approach;
    }

    /// Chooses the base compartment receiving births.
    ///
    /// # Errors
    ///
    /// Returns an error if no compartment has this base name.
    pub fn set_entry_compartment(&mut self, name: &str) -> Result<(), StructuralError> {
        if !self
            .compartments
            .iter()
            .any(|c| naming::base_name(&c.name) == name)
        {
            return Err(StructuralError::UnknownCompartment(name.to_owned()));
        }
        self.entry_compartment = name.to_owned();
        Ok(())
    }

    /// Returns a copy with constant overrides for existing parameters.
    ///
    /// Parameters scaled from an overridden parent follow the override.
    ///
    /// # Errors
    ///
    /// Returns an error if an override names an unknown parameter.
    pub fn with_overrides<K: AsRef<str>>(
        &self,
        overrides: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<Self, StructuralError> {
        let mut model = self.clone();
        for (name, value) in overrides {
            let name = name.as_ref();
            let slot = model
                .parameters
                .get_mut(name)
                .ok_or_else(|| StructuralError::UnknownParameter(name.to_owned()))?;
            *slot = ParameterValue::Constant(value);
        }
        Ok(model)
    }

    #[must_use]
    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    /// Compartment names in state vector order.
    pub fn compartment_names(&self) -> impl Iterator<Item = &str> {
        self.compartments.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, ParameterValue> {
        &self.parameters
    }

    #[must_use]
    pub fn history(&self) -> &[StratificationRecord] {
        &self.history
    }

    #[must_use]
    pub fn birth_approach(&self) -> &BirthApproach {
        &self.birth_approach
    }

    #[must_use]
    pub fn entry_compartment(&self) -> &str {
        &self.entry_compartment
    }

    #[must_use]
    pub fn infectious_compartments(&self) -> &[String] {
        &self.infectious
    }

    /// The name of the strain stratification, if one has been applied.
    #[must_use]
    pub fn strain_stratification(&self) -> Option<&str> {
        self.strain.as_deref()
    }

    /// Sum of all initial compartment populations.
    #[must_use]
    pub fn total_population(&self) -> f64 {
        self.compartments.iter().map(|c| c.population).sum()
    }

    /// Initial populations in state vector order.
    #[must_use]
    pub fn initial_populations(&self) -> Vec<f64> {
        self.compartments.iter().map(|c| c.population).collect()
    }

    /// Resolves a parameter at `time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter or one of its parents is unknown, or
    /// if its curve cannot be evaluated.
    pub fn parameter_at(&self, name: &str, time: f64) -> Result<f64, ParameterError> {
        parameter::resolve(&self.parameters, name, time)
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, StructuralError> {
        self.compartments
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StructuralError::UnknownCompartment(name.to_owned()))
    }

    /// Indices of the compartments selected by `query`.
    pub(crate) fn select(&self, query: &str) -> Result<Vec<usize>, StructuralError> {
        let selected: Vec<usize> = self
            .compartments
            .iter()
            .enumerate()
            .filter(|(_, c)| naming::matches(&c.name, query))
            .map(|(index, _)| index)
            .collect();
        if selected.is_empty() {
            return Err(StructuralError::UnknownCompartment(query.to_owned()));
        }
        Ok(selected)
    }
}

fn check_population(compartment: &str, value: f64) -> Result<(), StructuralError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StructuralError::InvalidPopulation {
            compartment: compartment.to_owned(),
            value,
        })
    }
}
