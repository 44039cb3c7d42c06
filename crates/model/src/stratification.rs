use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_functions::stratum_label;

use crate::{Adjustment, StructuralError, naming};

/// Tolerance used when checking that proportions sum to one.
const PROPORTION_TOLERANCE: f64 = 1e-9;

/// The role a stratification plays in the dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StratificationKind {
    /// Splits compartments without any special behaviour.
    General,

    /// Splits infection by strain: each strain has its own force of infection.
    Strain,

    /// Splits by age, adding ageing flows between consecutive groups.
    Age { breakpoints: Vec<f64> },
}

/// How the population share left by requested proportions is spread over the
/// strata without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Each unspecified stratum gets an equal share.
    #[default]
    SplitEvenly,

    /// Unspecified strata share the remainder in proportion to these weights.
    Weighted(BTreeMap<String, f64>),
}

/// The share of births entering one stratum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryProportion {
    Constant(f64),
    /// Resolved from a parameter at each evaluation, e.g. vaccine coverage.
    Parameter(String),
}

impl From<f64> for EntryProportion {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

/// A request to split compartments along one dimension.
///
/// Built with [`Stratification::new`], [`Stratification::strain`] or
/// [`Stratification::age`] and refined with the builder methods, then applied
/// with [`CompartmentalModel::stratify`](crate::CompartmentalModel::stratify).
///
/// ```
/// use strata_model::{Adjustment, Stratification};
///
/// let organ = Stratification::new("organ", ["smear_pos", "smear_neg", "extra_pul"])
///     .compartments(["infectious"])
///     .proportion("smear_pos", 0.5)
///     .proportion("smear_neg", 0.3)
///     .infectiousness("smear_neg", 0.24)
///     .infectiousness("extra_pul", 0.0)
///     .adjust("infect_death", "smear_neg", Adjustment::Multiply(0.3));
///
/// assert_eq!(organ.strata().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Stratification {
    pub(crate) name: String,
    pub(crate) strata: Vec<String>,
    pub(crate) kind: StratificationKind,
    pub(crate) compartments: Vec<String>,
    pub(crate) adjustments: BTreeMap<String, BTreeMap<String, Adjustment>>,
    pub(crate) infectiousness: BTreeMap<String, f64>,
    pub(crate) proportions: BTreeMap<String, f64>,
    pub(crate) remainder: RemainderPolicy,
    pub(crate) entry_proportions: BTreeMap<String, EntryProportion>,
}

impl Stratification {
    /// A general stratification into `strata`.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        strata: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_kind(name.into(), strata, StratificationKind::General)
    }

    /// A strain stratification into `strata`.
    pub fn strain<S: Into<String>>(
        name: impl Into<String>,
        strata: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_kind(name.into(), strata, StratificationKind::Strain)
    }

    /// An age stratification named `age` with groups starting at `breakpoints`.
    ///
    /// Breakpoints are sorted and `0` is added if missing. Each group is named
    /// by its lower bound, so `[15, 5]` gives the strata `0`, `5` and `15`.
    #[must_use]
    pub fn age(breakpoints: impl IntoIterator<Item = f64>) -> Self {
        let mut breakpoints: Vec<f64> = breakpoints.into_iter().collect();
        breakpoints.sort_by(f64::total_cmp);
        if breakpoints.first().is_none_or(|&first| first != 0.0) {
            breakpoints.insert(0, 0.0);
        }
        let strata: Vec<String> = breakpoints.iter().copied().map(stratum_label).collect();
        Self::with_kind("age".into(), strata, StratificationKind::Age { breakpoints })
    }

    fn with_kind<S: Into<String>>(
        name: String,
        strata: impl IntoIterator<Item = S>,
        kind: StratificationKind,
    ) -> Self {
        Self {
            name,
            strata: strata.into_iter().map(Into::into).collect(),
            kind,
            compartments: Vec::new(),
            adjustments: BTreeMap::new(),
            infectiousness: BTreeMap::new(),
            proportions: BTreeMap::new(),
            remainder: RemainderPolicy::default(),
            entry_proportions: BTreeMap::new(),
        }
    }

    /// Restricts the stratification to compartments selected by these names.
    ///
    /// Each entry is a base name or a full name. With no entries, every
    /// compartment is stratified.
    #[must_use]
    pub fn compartments<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.compartments = names.into_iter().map(Into::into).collect();
        self
    }

    /// Adjusts `parameter` for flows cloned into `stratum`.
    #[must_use]
    pub fn adjust(
        mut self,
        parameter: impl Into<String>,
        stratum: impl Into<String>,
        adjustment: Adjustment,
    ) -> Self {
        self.adjustments
            .entry(parameter.into())
            .or_default()
            .insert(stratum.into(), adjustment);
        self
    }

    /// Weights the contribution of `stratum` to the force of infection.
    #[must_use]
    pub fn infectiousness(mut self, stratum: impl Into<String>, weight: f64) -> Self {
        self.infectiousness.insert(stratum.into(), weight);
        self
    }

    /// Gives `stratum` a fixed share of each split compartment's population.
    #[must_use]
    pub fn proportion(mut self, stratum: impl Into<String>, proportion: f64) -> Self {
        self.proportions.insert(stratum.into(), proportion);
        self
    }

    #[must_use]
    pub fn remainder_policy(mut self, policy: RemainderPolicy) -> Self {
        self.remainder = policy;
        self
    }

    /// Sets the share of births entering `stratum`.
    #[must_use]
    pub fn entry_proportion(
        mut self,
        stratum: impl Into<String>,
        proportion: impl Into<EntryProportion>,
    ) -> Self {
        self.entry_proportions.insert(stratum.into(), proportion.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn strata(&self) -> &[String] {
        &self.strata
    }

    #[must_use]
    pub fn kind(&self) -> &StratificationKind {
        &self.kind
    }

    /// Checks everything that does not depend on the model being stratified.
    pub(crate) fn validate(&self) -> Result<(), StructuralError> {
        naming::validate_stratification(&self.name)?;
        if self.strata.is_empty() {
            return Err(StructuralError::NoStrata(self.name.clone()));
        }
        for (index, stratum) in self.strata.iter().enumerate() {
            naming::validate_stratum(stratum)?;
            if self.strata[..index].contains(stratum) {
                return Err(StructuralError::DuplicateStratum {
                    stratification: self.name.clone(),
                    stratum: stratum.clone(),
                });
            }
        }
        if let StratificationKind::Age { breakpoints } = &self.kind {
            let valid = breakpoints.iter().all(|b| b.is_finite() && *b >= 0.0)
                && breakpoints.windows(2).all(|pair| pair[0] < pair[1]);
            if !valid {
                return Err(StructuralError::InvalidBreakpoints);
            }
        }

        let named_strata = self
            .adjustments
            .values()
            .flat_map(BTreeMap::keys)
            .chain(self.infectiousness.keys())
            .chain(self.proportions.keys())
            .chain(self.entry_proportions.keys());
        for stratum in named_strata {
            self.check_stratum(stratum)?;
        }
        if let RemainderPolicy::Weighted(prior) = &self.remainder {
            for stratum in prior.keys() {
                self.check_stratum(stratum)?;
            }
        }

        for (stratum, &weight) in &self.infectiousness {
            if !weight.is_finite() || weight < 0.0 {
                return Err(StructuralError::InvalidWeight {
                    stratum: stratum.clone(),
                    value: weight,
                });
            }
        }
        self.check_entry_proportions()?;

        self.split_proportions().map(|_| ())
    }

    /// Constant entry proportions must leave a non-negative share for the
    /// strata they do not name, and sum to one when they name every stratum.
    /// Parameter-valued entry proportions are only known at run time, so they
    /// must name every stratum.
    fn check_entry_proportions(&self) -> Result<(), StructuralError> {
        if self.entry_proportions.is_empty() {
            return Ok(());
        }

        let mut requested = 0.0;
        let mut by_parameter = false;
        for (stratum, proportion) in &self.entry_proportions {
            match proportion {
                EntryProportion::Constant(value) => {
                    check_proportion(stratum, *value)?;
                    requested += value;
                }
                EntryProportion::Parameter(_) => by_parameter = true,
            }
        }

        let unnamed = self
            .strata
            .iter()
            .find(|stratum| !self.entry_proportions.contains_key(*stratum));
        if by_parameter {
            return match unnamed {
                Some(stratum) => Err(StructuralError::EntryProportionMissing {
                    stratification: self.name.clone(),
                    stratum: stratum.clone(),
                }),
                None => Ok(()),
            };
        }

        if requested > 1.0 + PROPORTION_TOLERANCE {
            return Err(StructuralError::EntryProportionsExceedOne(requested));
        }
        if unnamed.is_none() && (requested - 1.0).abs() > PROPORTION_TOLERANCE {
            return Err(StructuralError::EntryProportionsIncomplete(requested));
        }
        Ok(())
    }

    fn check_stratum(&self, stratum: &str) -> Result<(), StructuralError> {
        if self.strata.iter().any(|s| s == stratum) {
            Ok(())
        } else {
            Err(StructuralError::UnknownStratum {
                stratification: self.name.clone(),
                stratum: stratum.to_owned(),
            })
        }
    }

    /// The share of a split compartment's population in each stratum, in
    /// stratum order.
    pub(crate) fn split_proportions(&self) -> Result<Vec<f64>, StructuralError> {
        for (stratum, &value) in &self.proportions {
            check_proportion(stratum, value)?;
        }

        let requested: f64 = self.proportions.values().sum();
        if requested > 1.0 + PROPORTION_TOLERANCE {
            return Err(StructuralError::ProportionsExceedOne(requested));
        }
        let remainder = (1.0 - requested).max(0.0);

        let unspecified: Vec<&String> = self
            .strata
            .iter()
            .filter(|stratum| !self.proportions.contains_key(*stratum))
            .collect();
        if unspecified.is_empty() {
            if remainder > PROPORTION_TOLERANCE {
                return Err(StructuralError::ProportionsIncomplete(requested));
            }
            return Ok(self.strata.iter().map(|s| self.proportions[s]).collect());
        }

        let weights: Vec<f64> = match &self.remainder {
            RemainderPolicy::SplitEvenly => vec![1.0; unspecified.len()],
            RemainderPolicy::Weighted(prior) => unspecified
                .iter()
                .map(|stratum| prior.get(*stratum).copied().unwrap_or(0.0).max(0.0))
                .collect(),
        };
        let total_weight: f64 = weights.iter().sum();
        if total_weight <= 0.0 {
            return Err(StructuralError::EmptyPrior);
        }

        Ok(self
            .strata
            .iter()
            .map(|stratum| match self.proportions.get(stratum) {
                Some(&value) => value,
                None => {
                    let position = unspecified.iter().position(|s| *s == stratum).unwrap_or(0);
                    remainder * weights[position] / total_weight
                }
            })
            .collect())
    }

    /// The share of births entering each stratum, in stratum order.
    ///
    /// Strata without an explicit entry proportion share what the constant
    /// ones leave evenly. Without any, age stratifications send births to the
    /// youngest group and others split births like the population.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn entry_split(&self, split: &[f64]) -> Vec<EntryProportion> {
        if !self.entry_proportions.is_empty() {
            let requested: f64 = self
                .entry_proportions
                .values()
                .filter_map(|proportion| match proportion {
                    EntryProportion::Constant(value) => Some(*value),
                    EntryProportion::Parameter(_) => None,
                })
                .sum();
            let unnamed = self
                .strata
                .iter()
                .filter(|stratum| !self.entry_proportions.contains_key(*stratum))
                .count();
            let remainder = if unnamed == 0 {
                0.0
            } else {
                (1.0 - requested).max(0.0) / unnamed as f64
            };

            return self
                .strata
                .iter()
                .map(|stratum| {
                    self.entry_proportions
                        .get(stratum)
                        .cloned()
                        .unwrap_or(EntryProportion::Constant(remainder))
                })
                .collect();
        }
        match self.kind {
            StratificationKind::Age { .. } => (0..self.strata.len())
                .map(|index| EntryProportion::Constant(if index == 0 { 1.0 } else { 0.0 }))
                .collect(),
            StratificationKind::General | StratificationKind::Strain => {
                split.iter().copied().map(EntryProportion::Constant).collect()
            }
        }
    }
}

fn check_proportion(stratum: &str, value: f64) -> Result<(), StructuralError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StructuralError::InvalidProportion {
            stratum: stratum.to_owned(),
            value,
        })
    }
}
