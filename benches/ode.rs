use criterion::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use massbal::*;

fn fixture(name: &str) -> ModelDefinition {
    let path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    let json = std::fs::read_to_string(path).unwrap();
    ModelDefinition::from_json(&json).unwrap()
}

fn two_compartment() -> ModelDefinition {
    ModelDefinition::builder("two_compartment")
        .grid(TimeGrid::until(24.0, 0.5))
        .compartment("depot")
        .compartment("central")
        .compartment("peripheral")
        .parameter("ka", 0.3)
        .parameter("ke", 0.5)
        .parameter("k12", 0.1)
        .parameter("k21", 0.04)
        .derivative("depot", "-ka * depot")
        .derivative("central", "ka * depot - ke * central - k12 * central + k21 * peripheral")
        .derivative("peripheral", "k12 * central - k21 * peripheral")
        .bolus("depot", 100.0, &[0.0, 12.0])
        .build()
        .unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let settings = SolverSettings::default();

    let model = two_compartment();
    let run = Run::new(model.parameters());
    c.bench_function("two_compartment", |b| {
        b.iter(|| black_box(model.simulate(&run, &settings).unwrap()))
    });

    let kagan = fixture("kagan2013_compartmental");
    let run = Run::new(kagan.parameters());
    c.bench_function("kagan2013_compartmental", |b| {
        b.iter(|| black_box(kagan.simulate(&run, &settings).unwrap()))
    });

    let varga = fixture("varga_v3");
    let run = Run::new(varga.parameters());
    c.bench_function("varga_v3", |b| {
        b.iter(|| black_box(varga.simulate(&run, &settings).unwrap()))
    });

    let population =
        Population::lognormal(&kagan.parameters(), &[("kel", 0.3), ("L_kel", 0.3)], 64, 1)
            .unwrap();
    let runs: Vec<Run> = population.into_iter().map(Run::new).collect();
    c.bench_function("kagan2013_batch_64", |b| {
        b.iter(|| black_box(simulate_batch(&kagan, &runs, &settings, &BatchOptions::new())))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
