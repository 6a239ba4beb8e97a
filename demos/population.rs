use anyhow::Result;
use massbal::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let path = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/kagan2013_compartmental.json"
    );
    let model = ModelDefinition::from_json(&std::fs::read_to_string(path)?)?;

    let sets = Population::lognormal(
        &model.parameters(),
        &[("kel", 0.3), ("L_kel", 0.25), ("krelease", 0.4)],
        500,
        42,
    )?;
    let runs: Vec<Run> = sets
        .into_iter()
        .enumerate()
        // weights spread between 0.2 and 0.3 kg
        .map(|(i, p)| Run::new(p).covariate("wt", 0.2 + 0.1 * (i % 11) as f64 / 10.0))
        .collect();

    let options = BatchOptions::new().with_progress();
    let results = simulate_batch(&model, &runs, &SolverSettings::default(), &options);

    let mut trough = Vec::with_capacity(results.len());
    for result in &results {
        let table = result.as_ref().map_err(|e| anyhow::anyhow!("{}", e))?;
        if let Some(last) = table.column("C_AmB").and_then(|c| c.last().copied()) {
            trough.push(last);
        }
    }
    trough.sort_by(|a, b| a.total_cmp(b));
    let quantile = |q: f64| trough[((trough.len() - 1) as f64 * q).round() as usize];
    println!(
        "C_AmB at 24 h: 5% {:.4e}  50% {:.4e}  95% {:.4e}",
        quantile(0.05),
        quantile(0.5),
        quantile(0.95)
    );

    if let Some(Ok(first)) = results.first() {
        first.write_csv(std::io::stdout())?;
    }
    Ok(())
}
