use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

use crate::{NumericalWarning, OutputError, naming};

/// Relative tolerance when looking up a requested time on the output grid.
const TIME_TOLERANCE: f64 = 1e-9;

/// Compartment populations over time, produced once per run.
///
/// Rows are output times and columns are compartments in state vector order.
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    times: Vec<f64>,
    compartments: Vec<String>,
    values: Array2<f64>,
    warnings: Vec<NumericalWarning>,
}

/// One population value with its compartment name split into parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub time: f64,
    /// Base compartment name.
    pub compartment: String,
    /// Stratum of each applied stratification, keyed by stratification name.
    pub strata: BTreeMap<String, String>,
    pub value: f64,
}

impl Outputs {
    pub(crate) fn new(
        times: Vec<f64>,
        compartments: Vec<String>,
        values: Array2<f64>,
        warnings: Vec<NumericalWarning>,
    ) -> Self {
        Self {
            times,
            compartments,
            values,
            warnings,
        }
    }

    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[must_use]
    pub fn compartment_names(&self) -> &[String] {
        &self.compartments
    }

    /// The time × compartment population matrix.
    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Populations that were clamped to zero during the run.
    #[must_use]
    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }

    /// The trajectory of one compartment, by full name.
    ///
    /// # Errors
    ///
    /// Returns an error if no compartment has this name.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>, OutputError> {
        self.compartments
            .iter()
            .position(|c| c == name)
            .map(|index| self.values.column(index))
            .ok_or_else(|| OutputError::UnknownCompartment(name.to_owned()))
    }

    /// Total population of the selected compartments at each time.
    ///
    /// Each query is a base name, a full name, or a base name with some of its
    /// stratification tokens, such as `infectiousXstrain_mdr`. A compartment
    /// selected by several queries is counted once.
    ///
    /// # Errors
    ///
    /// Returns an error if a query selects no compartment.
    pub fn total_compartment_size<S: AsRef<str>>(
        &self,
        queries: &[S],
    ) -> Result<Array1<f64>, OutputError> {
        let selected = self.select(queries)?;
        let mut total = Array1::zeros(self.times.len());
        for index in selected {
            total += &self.values.column(index);
        }
        Ok(total)
    }

    /// Total population at each time.
    #[must_use]
    pub fn total_population(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(1))
    }

    /// Each compartment's share of the total population at each time.
    ///
    /// Rows with no population are all zero.
    #[must_use]
    pub fn proportions(&self) -> Array2<f64> {
        let totals = self.total_population();
        Array2::from_shape_fn(self.values.dim(), |(i, j)| {
            if totals[i] > 0.0 {
                self.values[(i, j)] / totals[i]
            } else {
                0.0
            }
        })
    }

    /// The selected compartments' share of the total population at each time.
    ///
    /// # Errors
    ///
    /// Returns an error if a query selects no compartment.
    pub fn proportion_of<S: AsRef<str>>(&self, queries: &[S]) -> Result<Array1<f64>, OutputError> {
        let selected = self.total_compartment_size(queries)?;
        let totals = self.total_population();
        Ok(ndarray::Zip::from(&selected)
            .and(&totals)
            .map_collect(|&part, &total| if total > 0.0 { part / total } else { 0.0 }))
    }

    /// The row of the output grid at `time`.
    ///
    /// # Errors
    ///
    /// Returns an error if `time` is not an output time.
    pub fn time_index(&self, time: f64) -> Result<usize, OutputError> {
        self.times
            .iter()
            .position(|&t| (t - time).abs() <= TIME_TOLERANCE * time.abs().max(1.0))
            .ok_or(OutputError::TimeNotInGrid(time))
    }

    /// One record per time and compartment, with names split into parts.
    #[must_use]
    pub fn long_format(&self) -> Vec<OutputRecord> {
        let parsed: Vec<(&str, BTreeMap<String, String>)> = self
            .compartments
            .iter()
            .map(|name| {
                let (base, strata) = naming::parse(name);
                let strata = strata
                    .into_iter()
                    .map(|(name, stratum)| (name.to_owned(), stratum.to_owned()))
                    .collect();
                (base, strata)
            })
            .collect();

        self.values
            .indexed_iter()
            .map(|((row, column), &value)| OutputRecord {
                time: self.times[row],
                compartment: parsed[column].0.to_owned(),
                strata: parsed[column].1.clone(),
                value,
            })
            .collect()
    }

    fn select<S: AsRef<str>>(&self, queries: &[S]) -> Result<Vec<usize>, OutputError> {
        let mut selected = vec![false; self.compartments.len()];
        for query in queries {
            let query = query.as_ref();
            let mut found = false;
            for (flag, name) in selected.iter_mut().zip(&self.compartments) {
                if naming::matches(name, query) {
                    *flag = true;
                    found = true;
                }
            }
            if !found {
                return Err(OutputError::UnknownCompartment(query.to_owned()));
            }
        }
        Ok(selected
            .into_iter()
            .enumerate()
            .filter_map(|(index, flag)| flag.then_some(index))
            .collect())
    }
}
