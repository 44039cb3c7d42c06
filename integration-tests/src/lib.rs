//! Shared model builders for the end-to-end scenarios in `tests/`.

use strata_functions::{
    Curve, CurveError, ScaleUp, ScaleUpMethod, StepFunction, per_day_to_per_year,
    values_at_breakpoints,
};
use strata_model::{
    Adjustment, BirthApproach, CompartmentalModel, Flow, Stratification, StructuralError,
};

/// Duration of untreated tuberculosis, in years.
pub const UNTREATED_DURATION: f64 = 3.0;

/// Case fatality of untreated tuberculosis.
pub const CASE_FATALITY: f64 = 0.4;

/// Age groups used by the tuberculosis scenarios.
pub const AGE_BREAKPOINTS: [f64; 3] = [0.0, 5.0, 15.0];

/// Latency rates per day, by the age at which each group starts.
const AGE_SPECIFIC_LATENCY: [(&str, [(f64, f64); 3]); 3] = [
    ("early_progression", [(0.0, 6.6e-3), (5.0, 2.7e-3), (15.0, 2.7e-4)]),
    ("stabilisation", [(0.0, 1.2e-2), (5.0, 1.2e-2), (15.0, 5.4e-3)]),
    ("late_progression", [(0.0, 1.9e-11), (5.0, 6.4e-6), (15.0, 3.3e-6)]),
];

/// A two-compartment susceptible-infectious-susceptible model.
///
/// # Errors
///
/// Returns an error if the model cannot be assembled.
pub fn sis(contact_rate: f64, recovery: f64) -> Result<CompartmentalModel, StructuralError> {
    let mut model = CompartmentalModel::new(["susceptible", "infectious"])?;
    model.set_initial_population(1000.0, [("infectious", 1.0)])?;
    model.add_parameter("contact_rate", contact_rate);
    model.add_parameter("recovery", recovery);
    model.add_transition_flow(Flow::infection_frequency(
        "contact_rate",
        "susceptible",
        "infectious",
    ))?;
    model.add_transition_flow(Flow::transition("recovery", "infectious", "susceptible"))?;
    Ok(model)
}

/// An unstratified tuberculosis model with latency, recovery, disease deaths
/// and births replacing deaths.
///
/// # Errors
///
/// Returns an error if the model cannot be assembled.
pub fn tuberculosis() -> Result<CompartmentalModel, StructuralError> {
    let mut model = CompartmentalModel::new([
        "susceptible",
        "early_latent",
        "late_latent",
        "infectious",
        "recovered",
    ])?;
    model.set_initial_population(1.0, [("infectious", 1e-3)])?;

    model.add_parameter("beta", 10.0);
    model.add_parameter("recovery", CASE_FATALITY / UNTREATED_DURATION);
    model.add_parameter("infect_death", (1.0 - CASE_FATALITY) / UNTREATED_DURATION);
    model.add_parameter("universal_death_rate", 1.0 / 50.0);
    model.add_parameter("case_detection", 0.0);
    model.add_parameter("early_progression", per_day_to_per_year(1.1e-3));
    model.add_parameter("stabilisation", per_day_to_per_year(1.0e-2));
    model.add_parameter("late_progression", per_day_to_per_year(5.5e-6));

    for flow in [
        Flow::infection_frequency("beta", "susceptible", "early_latent"),
        Flow::infection_frequency("beta", "recovered", "early_latent"),
        Flow::transition("early_progression", "early_latent", "infectious"),
        Flow::transition("stabilisation", "early_latent", "late_latent"),
        Flow::transition("late_progression", "late_latent", "infectious"),
        Flow::transition("recovery", "infectious", "recovered"),
        Flow::transition("case_detection", "infectious", "recovered"),
        Flow::death("infect_death", "infectious"),
    ] {
        model.add_transition_flow(flow)?;
    }
    model.set_birth_approach(BirthApproach::ReplaceDeaths);
    Ok(model)
}

/// Case detection rate: a detection proportion scaled up from zero in 1950,
/// converted to a rate competing with the untreated exits.
///
/// # Errors
///
/// Returns an error if the scale-up data is invalid.
pub fn case_detection() -> Result<Curve, CurveError> {
    let proportion = ScaleUp::new(
        [
            (1950.0, 0.0),
            (2000.0, 0.42),
            (2005.0, 0.55),
            (2010.0, 0.62),
            (2015.0, 0.66),
        ],
        ScaleUpMethod::SmoothedLinear { smoothness: 0.2 },
    )?;
    Ok(Curve::compose(
        Curve::proportion_to_rate(1.0 / UNTREATED_DURATION),
        proportion.into(),
    ))
}

/// The age stratification of the tuberculosis scenarios: age-specific latency
/// replacing the aggregate rates, and infectiousness rising through
/// adolescence.
///
/// # Errors
///
/// Returns an error if an age-specific curve cannot be sampled.
pub fn age_stratification() -> Result<Stratification, CurveError> {
    let mut age = Stratification::age(AGE_BREAKPOINTS);

    for (parameter, by_age) in AGE_SPECIFIC_LATENCY {
        let per_day = Curve::from(StepFunction::new(by_age)?);
        for (stratum, rate) in values_at_breakpoints(&per_day, &AGE_BREAKPOINTS)? {
            age = age.adjust(
                parameter,
                stratum,
                Adjustment::Absolute(per_day_to_per_year(rate)),
            );
        }
    }

    for (stratum, weight) in values_at_breakpoints(&Curve::logistic(15.0), &AGE_BREAKPOINTS)? {
        age = age.infectiousness(stratum, weight);
    }
    Ok(age)
}
