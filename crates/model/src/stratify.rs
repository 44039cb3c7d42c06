use std::collections::BTreeMap;

use crate::{
    Compartment, CompartmentalModel, Flow, ParameterValue, Stratification, StratificationKind,
    StratificationRecord, StructuralError, naming,
};

impl CompartmentalModel {
    /// Splits compartments along a new dimension and returns the larger model.
    ///
    /// Every targeted compartment is replaced in place by one child per
    /// stratum, holding its share of the population. Flows touching a targeted
    /// compartment are cloned per stratum:
    ///
    /// - with both ends targeted, each clone stays within its stratum
    /// - with only the origin targeted, each clone leaves its stratum
    /// - with only the destination targeted, each clone carries the stratum's
    ///   share of the parent rate, except infection flows under a strain
///   stratification, whose force of infection is already strain-specific
    ///
    /// A clone whose parameter is adjusted for its stratum gets the parameter
    /// `<parameter>X<name>_<stratum>`. Otherwise it keeps the parent's.
    ///
    /// Age stratifications also add ageing flows between consecutive groups.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving this model unchanged, if the request names an
    /// unknown compartment or stratum, repeats a stratum, has invalid
    /// proportions or weights, reuses an applied stratification name, or adds
    /// a second strain stratification.
    pub fn stratify(&self, request: &Stratification) -> Result<Self, StructuralError> {
        request.validate()?;
        if self.history.iter().any(|record| record.name == request.name) {
            return Err(StructuralError::AlreadyStratified(request.name.clone()));
        }
        if request.kind == StratificationKind::Strain {
            if let Some(existing) = &self.strain {
                return Err(StructuralError::SecondStrainStratification {
                    existing: existing.clone(),
                    requested: request.name.clone(),
                });
            }
        }

        let targeted = self.targets(request)?;
        let split = request.split_proportions()?;
        let weights: Vec<f64> = request
            .strata
            .iter()
            .map(|stratum| request.infectiousness.get(stratum).copied().unwrap_or(1.0))
            .collect();
        self.warn_unused_adjustments(request);

        let mut builder = Builder::new(request);

        let mut compartments = Vec::new();
        for (compartment, &is_targeted) in self.compartments.iter().zip(&targeted) {
            if !is_targeted {
                compartments.push(compartment.clone());
                continue;
            }
            for (index, stratum) in request.strata.iter().enumerate() {
                compartments.push(Compartment {
                    name: naming::stratified_name(&compartment.name, &request.name, stratum),
                    population: compartment.population * split[index],
                    infectiousness: compartment.infectiousness * weights[index],
                    death_parameter: builder.parameter(&compartment.death_parameter, index, 1.0)?,
                });
            }
        }

        let is_targeted = |name: &str| {
            self.compartments
                .iter()
                .zip(&targeted)
                .any(|(c, &t)| t && c.name == name)
        };

        let mut flows = Vec::new();
        for flow in &self.flows {
            let origin = is_targeted(flow.origin());
            let destination = flow.destination().is_some_and(is_targeted);
            if !origin && !destination {
                flows.push(flow.clone());
                continue;
            }

            for (index, stratum) in request.strata.iter().enumerate() {
                // Strain-tagged infections only see their own strain's
                // pressure, so they already partition the parent rate.
                let share = if origin
                    || (request.kind == StratificationKind::Strain && flow.is_infection())
                {
                    1.0
                } else {
                    split[index]
                };
                let parameter = builder.parameter(flow.parameter(), index, share)?;
                let stratified = |name: &str| naming::stratified_name(name, &request.name, stratum);

                let new_origin = if origin {
                    stratified(flow.origin())
                } else {
                    flow.origin().to_owned()
                };
                let new_destination = flow.destination().map(|name| {
                    if destination {
                        stratified(name)
                    } else {
                        name.to_owned()
                    }
                });
                let strain = (request.kind == StratificationKind::Strain && flow.is_infection())
                    .then(|| stratum.clone());

                flows.push(flow.restratified(parameter, new_origin, new_destination, strain));
            }
        }

        if let StratificationKind::Age { breakpoints } = &request.kind {
            for (compartment, _) in self
                .compartments
                .iter()
                .zip(&targeted)
                .filter(|(_, t)| **t)
            {
                for (index, pair) in breakpoints.windows(2).enumerate() {
                    let parameter = format!(
                        "ageing{}to{}",
                        request.strata[index],
                        request.strata[index + 1]
                    );
                    builder.insert(&parameter, ParameterValue::Constant(1.0 / (pair[1] - pair[0])))?;
                    flows.push(Flow::transition(
                        parameter,
                        naming::stratified_name(&compartment.name, &request.name, &request.strata[index]),
                        naming::stratified_name(
                            &compartment.name,
                            &request.name,
                            &request.strata[index + 1],
                        ),
                    ));
                }
            }
        }

        let created = builder.finish();
        let mut parameters = self.parameters.clone();
        for (name, value) in &created {
            if parameters.insert(name.clone(), value.clone()).is_some() {
                log::debug!("stratification {} replaced parameter {name}", request.name);
            }
        }

        log::debug!(
            "applied stratification {} with {} strata: {} compartments, {} flows",
            request.name,
            request.strata.len(),
            compartments.len(),
            flows.len(),
        );

        let mut history = self.history.clone();
        history.push(StratificationRecord {
            name: request.name.clone(),
            kind: request.kind.clone(),
            strata: request.strata.clone(),
            compartments: self
                .compartments
                .iter()
                .zip(&targeted)
                .filter(|(_, t)| **t)
                .map(|(c, _)| c.name.clone())
                .collect(),
            entry_proportions: request.entry_split(&split),
            proportions: split,
            infectiousness: weights,
            parameters: created.into_keys().collect(),
        });

        Ok(Self {
            compartments,
            flows,
            parameters,
            infectious: self.infectious.clone(),
            birth_approach: self.birth_approach.clone(),
            entry_compartment: self.entry_compartment.clone(),
            remainder_compartment: self.remainder_compartment.clone(),
            strain: if request.kind == StratificationKind::Strain {
                Some(request.name.clone())
            } else {
                self.strain.clone()
            },
            history,
        })
    }

    /// Flags which compartments the request splits.
    fn targets(&self, request: &Stratification) -> Result<Vec<bool>, StructuralError> {
        if request.compartments.is_empty() {
            return Ok(vec![true; self.compartments.len()]);
        }
        let mut targeted = vec![false; self.compartments.len()];
        for query in &request.compartments {
            for index in self.select(query)? {
                targeted[index] = true;
            }
        }
        Ok(targeted)
    }

    fn warn_unused_adjustments(&self, request: &Stratification) {
        for parameter in request.adjustments.keys() {
            let used = self
                .flows
                .iter()
                .map(Flow::parameter)
                .chain(self.compartments.iter().map(|c| c.death_parameter.as_str()))
                .any(|name| adjusts(parameter, name));
            if !used {
                log::warn!(
                    "stratification {} adjusts {parameter}, which no flow uses; ignoring it",
                    request.name
                );
            }
        }
    }
}

/// Whether an adjustment requested for `requested` applies to `parameter`.
fn adjusts(requested: &str, parameter: &str) -> bool {
    requested == parameter || requested == naming::base_name(parameter)
}

/// Collects the stratum-specific parameters created by one stratification.
struct Builder<'a> {
    request: &'a Stratification,
    created: BTreeMap<String, ParameterValue>,
}

impl<'a> Builder<'a> {
    fn new(request: &'a Stratification) -> Self {
        Self {
            request,
            created: BTreeMap::new(),
        }
    }

    /// The parameter a clone of a flow using `parent` uses in stratum `index`.
    ///
    /// `share` is the part of the parent rate the clone carries.
    fn parameter(
        &mut self,
        parent: &str,
        index: usize,
        share: f64,
    ) -> Result<String, StructuralError> {
        let stratum = &self.request.strata[index];
        let adjustment = self
            .request
            .adjustments
            .get(parent)
            .or_else(|| self.request.adjustments.get(naming::base_name(parent)))
            .and_then(|by_stratum| by_stratum.get(stratum));

        let value = match adjustment {
            Some(adjustment) => adjustment.apply(parent, share),
            None if share != 1.0 => ParameterValue::Scaled {
                parent: parent.to_owned(),
                factor: share,
            },
            None => return Ok(parent.to_owned()),
        };

        let name = naming::stratified_name(parent, &self.request.name, stratum);
        self.insert(&name, value)?;
        Ok(name)
    }

    fn insert(&mut self, name: &str, value: ParameterValue) -> Result<(), StructuralError> {
        match self.created.get(name) {
            Some(existing) if *existing != value => {
                Err(StructuralError::ConflictingParameter(name.to_owned()))
            }
            Some(_) => Ok(()),
            None => {
                self.created.insert(name.to_owned(), value);
                Ok(())
            }
        }
    }

    fn finish(self) -> BTreeMap<String, ParameterValue> {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::{Adjustment, EntryProportion};

    fn tb() -> CompartmentalModel {
        let mut model = CompartmentalModel::new([
            "susceptible",
            "early_latent",
            "late_latent",
            "infectious",
            "recovered",
        ])
        .unwrap();
        model
            .set_initial_population(1000.0, [("infectious", 10.0)])
            .unwrap();
        model.add_parameter("beta", 10.0);
        model.add_parameter("early_progression", 0.4);
        model.add_parameter("recovery", 0.2);
        model.add_parameter("infect_death", 0.1);
        for flow in [
            Flow::infection_frequency("beta", "susceptible", "early_latent"),
            Flow::transition("early_progression", "early_latent", "infectious"),
            Flow::transition("recovery", "infectious", "recovered"),
            Flow::death("infect_death", "infectious"),
        ] {
            model.add_transition_flow(flow).unwrap();
        }
        model
    }

    #[test]
    fn splits_in_place_and_conserves_population() {
        let model = tb();
        let stratified = model
            .stratify(
                &Stratification::new("risk", ["low", "mid", "high"])
                    .proportion("low", 0.2)
                    .proportion("mid", 0.3),
            )
            .unwrap();

        let names: Vec<&str> = stratified.compartment_names().take(4).collect();
        assert_eq!(
            names,
            [
                "susceptibleXrisk_low",
                "susceptibleXrisk_mid",
                "susceptibleXrisk_high",
                "early_latentXrisk_low"
            ]
        );
        assert_relative_eq!(stratified.total_population(), model.total_population());
        assert_relative_eq!(stratified.compartments()[2].population, 990.0 * 0.5);
        assert_eq!(stratified.compartments().len(), 15);
        assert_eq!(stratified.flows().len(), 12);
    }

    #[test]
    fn adjusted_clones_get_stratum_parameters() {
        let stratified = tb()
            .stratify(
                &Stratification::new("organ", ["pos", "neg"])
                    .compartments(["infectious"])
                    .adjust("infect_death", "neg", Adjustment::Multiply(0.5)),
            )
            .unwrap();

        let deaths: Vec<&str> = stratified
            .flows()
            .iter()
            .filter(|flow| flow.destination().is_none())
            .map(Flow::parameter)
            .collect();
        assert_eq!(deaths, ["infect_death", "infect_deathXorgan_neg"]);
        assert_relative_eq!(
            stratified.parameter_at("infect_deathXorgan_neg", 0.0).unwrap(),
            0.05
        );
        assert_eq!(stratified.history()[0].compartments, ["infectious"]);
    }

    #[test]
    fn destination_only_clones_share_the_parent_rate() {
        let stratified = tb()
            .stratify(
                &Stratification::new("organ", ["pos", "neg"])
                    .compartments(["infectious"])
                    .proportion("pos", 0.6),
            )
            .unwrap();

        let progression: Vec<f64> = stratified
            .flows()
            .iter()
            .filter(|flow| flow.origin() == "early_latent")
            .map(|flow| stratified.parameter_at(flow.parameter(), 0.0).unwrap())
            .collect();
        assert_relative_eq!(progression[0], 0.4 * 0.6);
        assert_relative_eq!(progression[1], 0.4 * 0.4);
    }

    #[test]
    fn strain_clones_are_tagged_and_unsplit() {
        let stratified = tb()
            .stratify(
                &Stratification::strain("strain", ["ds", "mdr"])
                    .compartments(["early_latent", "infectious", "recovered"]),
            )
            .unwrap();

        let infections: Vec<(&str, Option<&str>)> = stratified
            .flows()
            .iter()
            .filter(|flow| flow.is_infection())
            .map(|flow| (flow.parameter(), flow.strain()))
            .collect();
        assert_eq!(infections, [("beta", Some("ds")), ("beta", Some("mdr"))]);
        assert_eq!(stratified.strain_stratification(), Some("strain"));

        assert!(matches!(
            stratified.stratify(&Stratification::strain("lineage", ["a", "b"])),
            Err(StructuralError::SecondStrainStratification { .. })
        ));
    }

    #[test]
    fn strain_splits_non_infection_flows_into_its_strata() {
        let stratified = tb()
            .stratify(
                &Stratification::strain("strain", ["ds", "mdr"])
                    .compartments(["infectious"])
                    .proportion("ds", 0.75),
            )
            .unwrap();

        let progression: Vec<(&str, f64)> = stratified
            .flows()
            .iter()
            .filter(|flow| flow.origin() == "early_latent")
            .map(|flow| {
                let rate = stratified.parameter_at(flow.parameter(), 0.0).unwrap();
                (flow.destination().unwrap(), rate)
            })
            .collect();
        assert_eq!(progression.len(), 2);
        assert_eq!(progression[0].0, "infectiousXstrain_ds");
        assert_relative_eq!(progression[0].1, 0.4 * 0.75);
        assert_eq!(progression[1].0, "infectiousXstrain_mdr");
        assert_relative_eq!(progression[1].1, 0.4 * 0.25);
        assert!(
            stratified
                .flows()
                .iter()
                .filter(|flow| flow.origin() == "early_latent")
                .all(|flow| flow.strain().is_none())
        );
    }

    #[test]
    fn age_adds_ageing_flows() {
        let stratified = tb()
            .stratify(&Stratification::age([5.0, 15.0]).compartments(["susceptible"]))
            .unwrap();

        let ageing: Vec<(&str, &str)> = stratified
            .flows()
            .iter()
            .filter(|flow| flow.parameter().starts_with("ageing"))
            .map(|flow| (flow.origin(), flow.destination().unwrap()))
            .collect();
        assert_eq!(
            ageing,
            [
                ("susceptibleXage_0", "susceptibleXage_5"),
                ("susceptibleXage_5", "susceptibleXage_15")
            ]
        );
        assert_relative_eq!(stratified.parameter_at("ageing0to5", 0.0).unwrap(), 0.2);
        assert_relative_eq!(stratified.parameter_at("ageing5to15", 0.0).unwrap(), 0.1);
        assert_eq!(
            stratified.history()[0].entry_proportions[0],
            EntryProportion::Constant(1.0)
        );
    }

    #[test]
    fn adjustments_match_stratified_parameter_stems() {
        let stratified = tb()
            .stratify(&Stratification::age([15.0]).adjust(
                "early_progression",
                "15",
                Adjustment::Multiply(0.5),
            ))
            .unwrap()
            .stratify(
                &Stratification::new("hiv", ["neg", "pos"])
                    .adjust("early_progression", "pos", Adjustment::Multiply(3.0)),
            )
            .unwrap();

        assert_relative_eq!(
            stratified
                .parameter_at("early_progressionXage_15Xhiv_pos", 0.0)
                .unwrap(),
            0.6
        );
        assert_relative_eq!(
            stratified
                .parameter_at("early_progressionXhiv_pos", 0.0)
                .unwrap(),
            1.2
        );
    }

    #[test]
    fn failed_requests_leave_the_model_unchanged() {
        let model = tb();
        let before = model.clone();

        assert!(matches!(
            model.stratify(&Stratification::new("risk", ["a", "b"]).compartments(["exposed"])),
            Err(StructuralError::UnknownCompartment(_))
        ));
        assert!(matches!(
            model.stratify(
                &Stratification::new("risk", ["a", "b", "c"])
                    .proportion("a", 0.8)
                    .proportion("b", 0.4)
            ),
            Err(StructuralError::ProportionsExceedOne(_))
        ));
        assert_eq!(model, before);

        let once = model
            .stratify(&Stratification::new("risk", ["a", "b"]))
            .unwrap();
        assert!(matches!(
            once.stratify(&Stratification::new("risk", ["c", "d"])),
            Err(StructuralError::AlreadyStratified(_))
        ));
    }

    #[test]
    fn infectiousness_multiplies_across_stratifications() {
        let stratified = tb()
            .stratify(&Stratification::age([15.0]).infectiousness("0", 0.0))
            .unwrap()
            .stratify(
                &Stratification::new("organ", ["pos", "neg"])
                    .compartments(["infectious"])
                    .infectiousness("neg", 0.25),
            )
            .unwrap();

        let weight = |name: &str| {
            stratified
                .compartments()
                .iter()
                .find(|c| c.name == name)
                .unwrap()
                .infectiousness
        };
        assert_relative_eq!(weight("infectiousXage_15Xorgan_neg"), 0.25);
        assert_relative_eq!(weight("infectiousXage_0Xorgan_pos"), 0.0);
    }
}
