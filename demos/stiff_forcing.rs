use anyhow::Result;
use massbal::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .with_target(false)
        .init();

    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/varga_v3.json");
    let model = ModelDefinition::from_json(&std::fs::read_to_string(path)?)?;

    let settings = SolverSettings::default().with_tolerances(1e-8, 1e-6);
    let run = Run::new(model.parameters()).grid(TimeGrid::until(240.0, 1.0));
    let table = model.simulate(&run, &settings)?;

    let forcing = table.column("k_internalization").unwrap_or_default();
    let plasmid = table.column("total_plasmid").unwrap_or_default();
    let protein = table.column("Protein").unwrap_or_default();
    for (i, time) in table.times().iter().enumerate().step_by(24) {
        println!(
            "t = {:>5}  forcing = {:.3e}  plasmid = {:.3e}  protein = {:.3e}",
            time, forcing[i], plasmid[i], protein[i]
        );
    }

    let stats = table.statistics();
    println!(
        "{} accepted, {} rejected, {} rhs evaluations, {} jacobians, {} LU decompositions",
        stats.accepted, stats.rejected, stats.rhs_evals, stats.jacobian_evals, stats.lu_decompositions
    );
    Ok(())
}
