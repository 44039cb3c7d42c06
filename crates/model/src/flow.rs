use serde::{Deserialize, Serialize};

/// Movement between compartments at a named rate.
///
/// Each kind carries only the endpoints it needs: deaths have no destination,
/// and only infection flows can be tied to a strain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Flow {
    /// Moves `rate × origin` per unit time.
    Standard(Transition),

    /// Moves `rate × force × origin`, with the infectious population divided
    /// by the total population.
    InfectionFrequency(Infection),

    /// Moves `rate × force × origin`, without the denominator.
    InfectionDensity(Infection),

    /// Removes `rate × origin` from the population.
    CompartmentDeath(Exit),
}

/// A flow between two compartments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub parameter: String,
    pub origin: String,
    pub to: String,
}

/// An infection flow, optionally restricted to one strain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infection {
    pub parameter: String,
    pub origin: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strain: Option<String>,
}

/// A flow out of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub parameter: String,
    pub origin: String,
}

impl Flow {
    /// A standard transition from `origin` to `to`.
    pub fn transition(
        parameter: impl Into<String>,
        origin: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::Standard(Transition {
            parameter: parameter.into(),
            origin: origin.into(),
            to: to.into(),
        })
    }

    /// A frequency-dependent infection from `origin` to `to`.
    pub fn infection_frequency(
        parameter: impl Into<String>,
        origin: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InfectionFrequency(Infection {
            parameter: parameter.into(),
            origin: origin.into(),
            to: to.into(),
            strain: None,
        })
    }

    /// A density-dependent infection from `origin` to `to`.
    pub fn infection_density(
        parameter: impl Into<String>,
        origin: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InfectionDensity(Infection {
            parameter: parameter.into(),
            origin: origin.into(),
            to: to.into(),
            strain: None,
        })
    }

    /// A death flow out of `origin`.
    pub fn death(parameter: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::CompartmentDeath(Exit {
            parameter: parameter.into(),
            origin: origin.into(),
        })
    }

    #[must_use]
    pub fn parameter(&self) -> &str {
        match self {
            Self::Standard(flow) => &flow.parameter,
            Self::InfectionFrequency(flow) | Self::InfectionDensity(flow) => &flow.parameter,
            Self::CompartmentDeath(flow) => &flow.parameter,
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        match self {
            Self::Standard(flow) => &flow.origin,
            Self::InfectionFrequency(flow) | Self::InfectionDensity(flow) => &flow.origin,
            Self::CompartmentDeath(flow) => &flow.origin,
        }
    }

    /// The destination compartment, or `None` for deaths.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Standard(flow) => Some(&flow.to),
            Self::InfectionFrequency(flow) | Self::InfectionDensity(flow) => Some(&flow.to),
            Self::CompartmentDeath(_) => None,
        }
    }

    /// The strain an infection flow is restricted to.
    #[must_use]
    pub fn strain(&self) -> Option<&str> {
        match self {
            Self::InfectionFrequency(flow) | Self::InfectionDensity(flow) => flow.strain.as_deref(),
            Self::Standard(_) | Self::CompartmentDeath(_) => None,
        }
    }

    #[must_use]
    pub fn is_infection(&self) -> bool {
        matches!(self, Self::InfectionFrequency(_) | Self::InfectionDensity(_))
    }

    /// Returns a clone with new endpoints and parameter.
    ///
    /// `destination` is ignored for deaths. `strain` is ignored for flows that
    /// are not infections.
    pub(crate) fn restratified(
        &self,
        parameter: String,
        origin: String,
        destination: Option<String>,
        strain: Option<String>,
    ) -> Self {
        let to = || destination.clone().unwrap_or_default();
        match self {
            Self::Standard(_) => Self::Standard(Transition {
                parameter,
                origin,
                to: to(),
            }),
            Self::InfectionFrequency(flow) => Self::InfectionFrequency(Infection {
                parameter,
                origin,
                to: to(),
                strain: strain.or_else(|| flow.strain.clone()),
            }),
            Self::InfectionDensity(flow) => Self::InfectionDensity(Infection {
                parameter,
                origin,
                to: to(),
                strain: strain.or_else(|| flow.strain.clone()),
            }),
            Self::CompartmentDeath(_) => Self::CompartmentDeath(Exit { parameter, origin }),
        }
    }
}
