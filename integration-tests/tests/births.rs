use approx::assert_relative_eq;
use integration_tests::{age_stratification, sis, tuberculosis};
use strata_functions::Curve;
use strata_model::{
    BirthApproach, CompartmentalModel, EntryProportion, Flow, Integrator, Stratification,
    StructuralError,
};

#[test]
fn replacing_deaths_keeps_the_population_constant() {
    let model = tuberculosis()
        .unwrap()
        .stratify(&age_stratification().unwrap())
        .unwrap();
    let times: Vec<f64> = (0..=40).map(|year| f64::from(year) * 2.5).collect();

    let outputs = model.run(&times, &Integrator::default()).unwrap();

    for total in outputs.total_population() {
        assert_relative_eq!(total, 1.0, max_relative = 1e-6);
    }
}

#[test]
fn crude_birth_rate_grows_the_population_exponentially() {
    let mut model = CompartmentalModel::new(["susceptible", "infectious"]).unwrap();
    model
        .set_initial_population(100.0, [("infectious", 0.0)])
        .unwrap();
    model.add_parameter("universal_death_rate", 0.01);
    model.add_parameter("crude_birth_rate", 0.03);
    model.add_parameter("recovery", 1.0);
    model
        .add_transition_flow(Flow::transition("recovery", "infectious", "susceptible"))
        .unwrap();
    model.set_birth_approach(BirthApproach::CrudeBirthRate {
        parameter: "crude_birth_rate".into(),
    });

    let outputs = model.run(&[0.0, 10.0, 20.0], &Integrator::default()).unwrap();

    for (row, time) in [0.0_f64, 10.0, 20.0].into_iter().enumerate() {
        assert_relative_eq!(
            outputs.total_population()[row],
            100.0 * (0.02 * time).exp(),
            max_relative = 1e-5
        );
    }
}

fn replacing_deaths() -> CompartmentalModel {
    let mut model = sis(0.0, 0.5).unwrap();
    model.add_parameter("universal_death_rate", 0.1);
    model.set_birth_approach(BirthApproach::ReplaceDeaths);
    model
}

#[test]
fn partial_entry_proportions_still_replace_every_death() {
    let model = replacing_deaths()
        .stratify(
            &Stratification::new("bcg", ["vaccinated", "unvaccinated"])
                .compartments(["susceptible"])
                .entry_proportion("vaccinated", 0.3),
        )
        .unwrap();
    assert_eq!(
        model.history()[0].entry_proportions,
        vec![EntryProportion::Constant(0.3), EntryProportion::Constant(0.7)]
    );

    let outputs = model.run(&[0.0, 5.0, 10.0], &Integrator::default()).unwrap();

    for total in outputs.total_population() {
        assert_relative_eq!(total, 1000.0, max_relative = 1e-6);
    }
}

#[test]
fn entry_proportions_above_one_are_rejected() {
    let result = replacing_deaths().stratify(
        &Stratification::new("bcg", ["vaccinated", "unvaccinated"])
            .compartments(["susceptible"])
            .entry_proportion("vaccinated", 0.7)
            .entry_proportion("unvaccinated", 0.7),
    );

    assert!(matches!(
        result,
        Err(StructuralError::EntryProportionsExceedOne(_))
    ));
}

/// Births split by a vaccine coverage curve and its complement, with the
/// crude birth rate matching background mortality.
#[test]
fn vaccine_coverage_directs_births() {
    const COVERAGE: f64 = 0.8;
    const RATE: f64 = 0.02;
    const POPULATION: f64 = 1000.0;

    let mut model = CompartmentalModel::new(["susceptible", "infectious"]).unwrap();
    model
        .set_initial_population(POPULATION, [("infectious", 0.0)])
        .unwrap();
    model.add_parameter("universal_death_rate", RATE);
    model.add_parameter("crude_birth_rate", RATE);
    model.add_parameter("bcg_coverage", Curve::from(COVERAGE));
    model.add_parameter("bcg_coverage_complement", Curve::from(COVERAGE).complement());
    model.set_birth_approach(BirthApproach::CrudeBirthRate {
        parameter: "crude_birth_rate".into(),
    });
    let model = model
        .stratify(
            &Stratification::new("bcg", ["vaccinated", "unvaccinated"])
                .compartments(["susceptible"])
                .proportion("vaccinated", 0.0)
                .entry_proportion("vaccinated", EntryProportion::Parameter("bcg_coverage".into()))
                .entry_proportion(
                    "unvaccinated",
                    EntryProportion::Parameter("bcg_coverage_complement".into()),
                ),
        )
        .unwrap();

    let times: Vec<f64> = (0..=5).map(|decade| f64::from(decade) * 10.0).collect();
    let outputs = model.run(&times, &Integrator::default()).unwrap();
    let vaccinated = outputs
        .total_compartment_size(&["susceptibleXbcg_vaccinated"])
        .unwrap();

    for (row, time) in times.iter().enumerate() {
        let expected = COVERAGE * POPULATION * (1.0 - (-RATE * time).exp());
        assert_relative_eq!(vaccinated[row], expected, max_relative = 1e-5, epsilon = 1e-9);
        assert_relative_eq!(
            outputs.total_population()[row],
            POPULATION,
            max_relative = 1e-9
        );
    }
}
