use serde::{Deserialize, Serialize};

/// How new members enter the population.
///
/// Births always enter the entry compartment, split over its strata by the
/// entry proportions of every stratification applied to it. Each
/// stratification's shares sum to one, so no birth is lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BirthApproach {
    /// The population only shrinks.
    #[default]
    NoBirths,

    /// Births equal total deaths, keeping the population constant.
    ReplaceDeaths,

    /// Births equal `rate × total population`, with the rate read from `parameter`.
    CrudeBirthRate { parameter: String },
}
