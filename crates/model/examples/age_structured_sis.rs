//! Runs an age-structured SIS model and prints prevalence by age group.
//!
//! ```text
//! cargo run -p strata-model --example age_structured_sis
//! ```

use std::error::Error;

use strata_functions::{Curve, values_at_breakpoints};
use strata_model::{Adjustment, CompartmentalModel, Flow, Integrator, Stratification};

fn main() -> Result<(), Box<dyn Error>> {
    let mut model = CompartmentalModel::new(["susceptible", "infectious"])?;
    model.set_initial_population(10_000.0, [("infectious", 10.0)])?;
    model.add_parameter("contact_rate", 12.0);
    model.add_parameter("recovery", 2.0);
    model.add_transition_flow(Flow::infection_frequency(
        "contact_rate",
        "susceptible",
        "infectious",
    ))?;
    model.add_transition_flow(Flow::transition("recovery", "infectious", "susceptible"))?;

    let breakpoints = [0.0, 5.0, 15.0, 40.0];
    let mut age = Stratification::age(breakpoints)
        .adjust("recovery", "0", Adjustment::Multiply(1.5))
        .proportion("0", 0.1)
        .proportion("5", 0.2)
        .proportion("15", 0.3);
    for (stratum, weight) in values_at_breakpoints(&Curve::logistic(15.0), &breakpoints)? {
        age = age.infectiousness(stratum, weight);
    }
    let model = model.stratify(&age)?;

    let times: Vec<f64> = (0..=10).map(f64::from).collect();
    let outputs = model.run(&times, &Integrator::default())?;

    println!("{:>6} {:>10} {:>10} {:>10} {:>10}", "year", "0", "5", "15", "40");
    for (row, time) in outputs.times().iter().enumerate() {
        let mut line = format!("{time:>6.1}");
        for group in ["0", "5", "15", "40"] {
            let infectious = outputs.total_compartment_size(&[format!("infectiousXage_{group}")])?;
            let everyone = outputs.total_compartment_size(&[
                format!("infectiousXage_{group}"),
                format!("susceptibleXage_{group}"),
            ])?;
            line.push_str(&format!(" {:>10.4}", infectious[row] / everyone[row]));
        }
        println!("{line}");
    }

    println!("\n{}", model.flowchart().to_dot());
    Ok(())
}
