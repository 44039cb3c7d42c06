//! Derivative assembly.
//!
//! [`Dynamics`] is a [`CompartmentalModel`] compiled for evaluation: every
//! parameter it uses is reduced to a constant or a scaled curve, and every
//! flow refers to compartments and rates by index. It implements
//! [`strata_core::Model`], mapping populations at a time to their rates of
//! change, and [`PopulationProblem`] adapts it to the solvers.

use std::{cell::RefCell, collections::BTreeMap, convert::Infallible};

use serde::Serialize;
use strata_core::{FlatState, Model, OdeProblem, StepIntegrable};

use crate::{
    BirthApproach, CompartmentalModel, EntryProportion, Flow, ParameterError, RunError,
    StructuralError, naming,
    parameter::{self, Rate},
};

/// Compartment populations in state vector order.
#[derive(Debug, Clone, PartialEq)]
pub struct Populations(pub Vec<f64>);

/// Rate of change of each compartment population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRates(pub Vec<f64>);

impl StepIntegrable<f64> for Populations {
    type Derivative = PopulationRates;

    fn step(&self, derivative: PopulationRates, delta: f64) -> Self {
        Populations(
            self.0
                .iter()
                .zip(&derivative.0)
                .map(|(population, rate)| population + rate * delta)
                .collect(),
        )
    }
}

impl FlatState for Populations {
    fn components(&self) -> &[f64] {
        &self.0
    }

    fn from_components(components: Vec<f64>) -> Self {
        Populations(components)
    }
}

impl FlatState for PopulationRates {
    fn components(&self) -> &[f64] {
        &self.0
    }

    fn from_components(components: Vec<f64>) -> Self {
        PopulationRates(components)
    }
}

/// The state of the model at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationInput {
    pub time: f64,
    pub populations: Populations,
}

/// Everything the dynamics compute from a [`PopulationInput`].
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationOutput {
    pub rates: PopulationRates,

    /// Force of infection per strain, or a single entry without strains.
    pub force_of_infection: Vec<f64>,

    /// Total deaths per unit time, from death flows and background mortality.
    pub deaths: f64,

    /// Total births per unit time.
    pub births: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FlowKind {
    Standard,
    Frequency,
    Density,
    Death,
}

#[derive(Debug, Clone, PartialEq)]
struct IndexedFlow {
    kind: FlowKind,
    origin: usize,
    destination: Option<usize>,
    rate: usize,
    /// Strain slot for infections restricted to one strain.
    strain: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Births {
    None,
    ReplaceDeaths,
    CrudeRate(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EntryFactor {
    Constant(f64),
    Rate(usize),
}

/// Entry proportions of one stratification that splits the entry compartment.
#[derive(Debug, Clone, PartialEq)]
struct EntryGroup {
    stratification: String,
    factors: Vec<EntryFactor>,
}

impl EntryGroup {
    /// The share of births for each stratum, normalised to sum to one.
    fn shares(&self, values: &[f64]) -> Result<Vec<f64>, ParameterError> {
        let raw: Vec<f64> = self
            .factors
            .iter()
            .map(|factor| match factor {
                EntryFactor::Constant(value) => *value,
                EntryFactor::Rate(rate) => values[*rate],
            })
            .collect();
        let sum: f64 = raw.iter().sum();

        if raw.iter().any(|value| !value.is_finite() || *value < 0.0) || sum <= 0.0 {
            return Err(ParameterError::EntryProportions {
                stratification: self.stratification.clone(),
                sum,
            });
        }
        Ok(raw.into_iter().map(|value| value / sum).collect())
    }
}

/// A model compiled for evaluation.
#[derive(Debug, Clone)]
pub struct Dynamics {
    rate_names: Vec<String>,
    rates: Vec<Rate>,
    flows: Vec<IndexedFlow>,
    death_rates: Vec<usize>,
    /// Weight of each compartment in the force of infection, zero if it is
    /// not infectious.
    infectiousness: Vec<f64>,
    /// Strain slot of each compartment, if stratified by strain.
    strain_of: Vec<Option<usize>>,
    strains: Vec<String>,
    births: Births,
    entry_groups: Vec<EntryGroup>,
    /// Each entry compartment with its `(group, stratum)` slots.
    entry: Vec<(usize, Vec<(usize, usize)>)>,
}

impl Dynamics {
    /// Compiles `model`, resolving every parameter it uses.
    ///
    /// # Errors
    ///
    /// Returns an error if a flow, death, birth or entry parameter is unknown
    /// or refers to itself, or if a flow names an unknown compartment.
    pub fn new(model: &CompartmentalModel) -> Result<Self, RunError> {
        let mut table = RateTable::new(&model.parameters);

        let strains: Vec<String> = model
            .strain
            .as_ref()
            .and_then(|name| model.history.iter().find(|record| &record.name == name))
            .map(|record| record.strata.clone())
            .unwrap_or_default();
        let strain_slot = |stratum: &str| strains.iter().position(|s| s == stratum);

        let index_of = |name: &str| {
            model
                .compartments
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| StructuralError::UnknownCompartment(name.to_owned()))
        };

        let mut flows = Vec::with_capacity(model.flows.len());
        for flow in &model.flows {
            let kind = match flow {
                Flow::Standard(_) => FlowKind::Standard,
                Flow::InfectionFrequency(_) => FlowKind::Frequency,
                Flow::InfectionDensity(_) => FlowKind::Density,
                Flow::CompartmentDeath(_) => FlowKind::Death,
            };
            flows.push(IndexedFlow {
                kind,
                origin: index_of(flow.origin())?,
                destination: flow.destination().map(index_of).transpose()?,
                rate: table.index(flow.parameter())?,
                strain: flow.strain().and_then(strain_slot),
            });
        }

        let death_rates = model
            .compartments
            .iter()
            .map(|c| table.index(&c.death_parameter))
            .collect::<Result<Vec<_>, _>>()?;

        let infectiousness = model
            .compartments
            .iter()
            .map(|c| {
                let infectious = model
                    .infectious
                    .iter()
                    .any(|query| naming::matches(&c.name, query));
                if infectious { c.infectiousness } else { 0.0 }
            })
            .collect();

        let strain_of = model
            .compartments
            .iter()
            .map(|c| {
                model
                    .strain
                    .as_deref()
                    .and_then(|name| naming::stratum_of(&c.name, name))
                    .and_then(strain_slot)
            })
            .collect();

        let births = match &model.birth_approach {
            BirthApproach::NoBirths => Births::None,
            BirthApproach::ReplaceDeaths => Births::ReplaceDeaths,
            BirthApproach::CrudeBirthRate { parameter } => Births::CrudeRate(table.index(parameter)?),
        };

        let mut entry_groups: Vec<EntryGroup> = Vec::new();
        let mut group_of: Vec<Option<usize>> = vec![None; model.history.len()];
        let mut entry = Vec::new();
        if births != Births::None {
            for (index, compartment) in model.compartments.iter().enumerate() {
                if naming::base_name(&compartment.name) != model.entry_compartment {
                    continue;
                }
                let mut slots = Vec::new();
                for (record_index, record) in model.history.iter().enumerate() {
                    let Some(stratum) = naming::stratum_of(&compartment.name, &record.name) else {
                        continue;
                    };
                    let Some(position) = record.strata.iter().position(|s| s == stratum) else {
                        continue;
                    };
                    let group = match group_of[record_index] {
                        Some(group) => group,
                        None => {
                            let mut factors = Vec::with_capacity(record.entry_proportions.len());
                            for proportion in &record.entry_proportions {
                                factors.push(match proportion {
                                    EntryProportion::Constant(value) => {
                                        EntryFactor::Constant(*value)
                                    }
                                    EntryProportion::Parameter(name) => {
                                        EntryFactor::Rate(table.index(name)?)
                                    }
                                });
                            }
                            entry_groups.push(EntryGroup {
                                stratification: record.name.clone(),
                                factors,
                            });
                            group_of[record_index] = Some(entry_groups.len() - 1);
                            entry_groups.len() - 1
                        }
                    };
                    slots.push((group, position));
                }
                entry.push((index, slots));
            }
            if entry.is_empty() {
                log::warn!(
                    "births are enabled but no compartment is based on the entry compartment {}",
                    model.entry_compartment
                );
            }
        }

        let (rate_names, rates) = table.finish();
        log::debug!(
            "compiled {} compartments, {} flows and {} rates",
            model.compartments.len(),
            flows.len(),
            rates.len(),
        );

        Ok(Self {
            rate_names,
            rates,
            flows,
            death_rates,
            infectiousness,
            strain_of,
            strains,
            births,
            entry_groups,
            entry,
        })
    }

    /// Strain names in force-of-infection order. Empty without strains.
    #[must_use]
    pub fn strains(&self) -> &[String] {
        &self.strains
    }

    fn rates_at(&self, time: f64) -> Result<Vec<f64>, ParameterError> {
        self.rates
            .iter()
            .zip(&self.rate_names)
            .map(|(rate, name)| rate.at(name, time))
            .collect()
    }

    /// Infectious pressure overall and per strain.
    fn pressure(&self, populations: &[f64]) -> (f64, Vec<f64>) {
        let mut by_strain = vec![0.0; self.strains.len()];
        let mut total = 0.0;
        for ((population, weight), strain) in populations
            .iter()
            .zip(&self.infectiousness)
            .zip(&self.strain_of)
        {
            let contribution = population * weight;
            total += contribution;
            if let Some(slot) = strain {
                by_strain[*slot] += contribution;
            }
        }
        (total, by_strain)
    }
}

impl Model for Dynamics {
    type Input = PopulationInput;
    type Output = PopulationOutput;
    type Error = ParameterError;

    fn call(&self, input: &PopulationInput) -> Result<PopulationOutput, ParameterError> {
        let values = self.rates_at(input.time)?;
        let populations = &input.populations.0;
        let total: f64 = populations.iter().sum();

        let (pressure, by_strain) = self.pressure(populations);
        let per_capita = |pressure: f64| if total > 0.0 { pressure / total } else { 0.0 };

        let mut rates = vec![0.0; populations.len()];
        let mut deaths = 0.0;

        for flow in &self.flows {
            let strain_pressure = flow.strain.map_or(pressure, |slot| by_strain[slot]);
            let force = match flow.kind {
                FlowKind::Standard | FlowKind::Death => 1.0,
                FlowKind::Frequency => per_capita(strain_pressure),
                FlowKind::Density => strain_pressure,
            };
            let amount = values[flow.rate] * force * populations[flow.origin];

            rates[flow.origin] -= amount;
            match flow.destination {
                Some(destination) => rates[destination] += amount,
                None => deaths += amount,
            }
        }

        for (index, &rate) in self.death_rates.iter().enumerate() {
            let amount = values[rate] * populations[index];
            rates[index] -= amount;
            deaths += amount;
        }

        let births = match self.births {
            Births::None => 0.0,
            Births::ReplaceDeaths => deaths,
            Births::CrudeRate(rate) => values[rate] * total,
        };
        if !self.entry.is_empty() {
            let shares = self
                .entry_groups
                .iter()
                .map(|group| group.shares(&values))
                .collect::<Result<Vec<_>, _>>()?;
            for (index, slots) in &self.entry {
                let share: f64 = slots
                    .iter()
                    .map(|&(group, position)| shares[group][position])
                    .product();
                rates[*index] += births * share;
            }
        }

        let force_of_infection = if self.strains.is_empty() {
            vec![per_capita(pressure)]
        } else {
            by_strain.into_iter().map(per_capita).collect()
        };

        Ok(PopulationOutput {
            rates: PopulationRates(rates),
            force_of_infection,
            deaths,
            births,
        })
    }
}

/// A population that had to be clamped after an accepted step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericalWarning {
    pub time: f64,
    pub compartment: String,
    /// The value before clamping.
    pub value: f64,
}

/// Adapts [`Dynamics`] to the solvers, keeping populations non-negative.
///
/// Every accepted step is checked: negative or non-finite populations are set
/// to zero and recorded as [`NumericalWarning`]s.
#[derive(Debug)]
pub struct PopulationProblem {
    compartments: Vec<String>,
    warnings: RefCell<Vec<NumericalWarning>>,
}

impl PopulationProblem {
    #[must_use]
    pub fn new(compartments: Vec<String>) -> Self {
        Self {
            compartments,
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Consumes the problem, returning the warnings recorded so far.
    #[must_use]
    pub fn into_warnings(self) -> Vec<NumericalWarning> {
        self.warnings.into_inner()
    }
}

impl OdeProblem for PopulationProblem {
    type Input = PopulationInput;
    type Output = PopulationOutput;
    type Delta = f64;
    type State = Populations;
    type Error = Infallible;

    fn state(&self, input: &PopulationInput) -> Result<Populations, Infallible> {
        Ok(input.populations.clone())
    }

    fn derivative(
        &self,
        _input: &PopulationInput,
        output: &PopulationOutput,
    ) -> Result<PopulationRates, Infallible> {
        Ok(output.rates.clone())
    }

    fn build_input(
        &self,
        base: &PopulationInput,
        state: &Populations,
        delta: &f64,
    ) -> Result<PopulationInput, Infallible> {
        Ok(PopulationInput {
            time: base.time + delta,
            populations: state.clone(),
        })
    }

    fn finalize_step(
        &self,
        mut next_input: PopulationInput,
        _prev_input: &PopulationInput,
        _prev_output: &PopulationOutput,
        _step_delta: &f64,
    ) -> Result<PopulationInput, Infallible> {
        for (population, name) in next_input
            .populations
            .0
            .iter_mut()
            .zip(&self.compartments)
        {
            if population.is_finite() && *population >= 0.0 {
                continue;
            }
            log::warn!(
                "clamped {name} from {population} to zero at t = {}",
                next_input.time
            );
            self.warnings.borrow_mut().push(NumericalWarning {
                time: next_input.time,
                compartment: name.clone(),
                value: *population,
            });
            *population = 0.0;
        }
        Ok(next_input)
    }
}

/// Assigns each distinct parameter one slot in the evaluated rate vector.
struct RateTable<'a> {
    parameters: &'a BTreeMap<String, parameter::ParameterValue>,
    slots: BTreeMap<String, usize>,
    names: Vec<String>,
    rates: Vec<Rate>,
}

impl<'a> RateTable<'a> {
    fn new(parameters: &'a BTreeMap<String, parameter::ParameterValue>) -> Self {
        Self {
            parameters,
            slots: BTreeMap::new(),
            names: Vec::new(),
            rates: Vec::new(),
        }
    }

    fn index(&mut self, name: &str) -> Result<usize, ParameterError> {
        if let Some(&slot) = self.slots.get(name) {
            return Ok(slot);
        }
        let rate = parameter::compile(self.parameters, name)?;
        let slot = self.rates.len();
        self.slots.insert(name.to_owned(), slot);
        self.names.push(name.to_owned());
        self.rates.push(rate);
        Ok(slot)
    }

    fn finish(self) -> (Vec<String>, Vec<Rate>) {
        (self.names, self.rates)
    }
}
