//! Frequency- and density-dependent transmission end to end.

use approx::assert_relative_eq;
use strata_model::{CompartmentalModel, Flow, Integrator, Stratification};

const POPULATION: f64 = 1000.0;
const SEED: f64 = 1.0;

/// Susceptible-infectious model with no recovery, so infections grow
/// logistically.
fn si(flow: Flow, beta: f64) -> CompartmentalModel {
    let mut model = CompartmentalModel::new(["susceptible", "infectious"]).unwrap();
    model
        .set_initial_population(POPULATION, [("infectious", SEED)])
        .unwrap();
    model.add_parameter("beta", beta);
    model.add_transition_flow(flow).unwrap();
    model
}

/// `I(t)` for `I' = rate * S * I / N` starting from `SEED` infectious.
fn logistic(rate: f64, time: f64) -> f64 {
    let growth = (rate * time).exp();
    POPULATION * SEED * growth / (POPULATION - SEED + SEED * growth)
}

#[test]
fn density_dependent_transmission_follows_the_logistic_curve() {
    let beta = 0.001;
    let model = si(
        Flow::infection_density("beta", "susceptible", "infectious"),
        beta,
    );
    let times: Vec<f64> = (0..=10).map(f64::from).collect();

    let outputs = model.run(&times, &Integrator::default()).unwrap();
    let infectious = outputs.total_compartment_size(&["infectious"]).unwrap();

    for (time, value) in times.iter().zip(&infectious) {
        assert_relative_eq!(
            *value,
            logistic(beta * POPULATION, *time),
            max_relative = 1e-5
        );
    }
}

#[test]
fn density_matches_frequency_scaled_by_population() {
    let density = si(
        Flow::infection_density("beta", "susceptible", "infectious"),
        0.002,
    );
    let frequency = si(
        Flow::infection_frequency("beta", "susceptible", "infectious"),
        0.002 * POPULATION,
    );
    let times = [0.0, 1.0, 2.0, 4.0];

    let by_density = density.run(&times, &Integrator::default()).unwrap();
    let by_frequency = frequency.run(&times, &Integrator::default()).unwrap();

    for (d, f) in by_density
        .total_compartment_size(&["infectious"])
        .unwrap()
        .iter()
        .zip(&by_frequency.total_compartment_size(&["infectious"]).unwrap())
    {
        assert_relative_eq!(*d, *f, max_relative = 1e-5);
    }
}

#[test]
fn density_transmission_survives_an_unadjusted_split() {
    let beta = 0.001;
    let model = si(
        Flow::infection_density("beta", "susceptible", "infectious"),
        beta,
    );
    let stratified = model
        .stratify(&Stratification::new("risk", ["low", "high"]).proportion("low", 0.4))
        .unwrap();

    let times = [0.0, 3.0, 6.0];
    let outputs = stratified.run(&times, &Integrator::default()).unwrap();
    let infectious = outputs.total_compartment_size(&["infectious"]).unwrap();

    for (time, value) in times.iter().zip(&infectious) {
        assert_relative_eq!(
            *value,
            logistic(beta * POPULATION, *time),
            max_relative = 1e-5
        );
    }
}
