use approx::assert_relative_eq;
use massbal::model::{ExpressionOrNumber, ModelSpec};
use massbal::*;

fn fixture(name: &str) -> ModelSpec {
    let path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    let json = std::fs::read_to_string(&path).expect("fixture exists");
    ModelSpec::from_json(&json).expect("fixture parses")
}

fn load(name: &str) -> ModelDefinition {
    ModelDefinition::from_spec(&fixture(name)).unwrap()
}

#[test]
fn banks_captures_main_locals() {
    let model = load("banks2003");
    let table = model
        .simulate(&Run::new(model.parameters()), &SolverSettings::default())
        .unwrap();
    assert_eq!(table.columns(), vec!["time", "M", "C", "N", "k_cn_diff", "k_cn_act"]);
    let diff = table.column("k_cn_diff").unwrap();
    let act = table.column("k_cn_act").unwrap();
    assert!(diff.iter().all(|&v| v == 4.5e-1 * 7.22e-9));
    assert_relative_eq!(act[0], 6.68e-1 * 3.98e-7 / 7.22e-9 - 4.5e-1);
    // nothing dosed, nothing moves
    assert!(table.rows().iter().all(|r| r.states == vec![0.0, 0.0, 0.0]));
}

#[test]
fn kagan_total_drug_is_conserved() {
    let model = load("kagan2013_compartmental");
    let settings = SolverSettings::default();

    let table = model
        .simulate(&Run::new(model.parameters()), &settings)
        .unwrap();
    assert_eq!(table.len(), 241);
    let first = &table.rows()[0];
    assert_relative_eq!(first.states[0], 0.8 * 0.25 * (1.0 - 1.83 / 100.0));
    assert_relative_eq!(first.states[2], 0.8 * 0.25 * 1.83 / 100.0);
    for total in table.column("totaldrug").unwrap() {
        assert_relative_eq!(total, 0.2, max_relative = 1e-8);
    }

    let heavier = model
        .simulate(
            &Run::new(model.parameters()).covariate("wt", 0.3),
            &settings,
        )
        .unwrap();
    for total in heavier.column("totaldrug").unwrap() {
        assert_relative_eq!(total, 0.24, max_relative = 1e-8);
    }
}

#[test]
fn kagan_chained_captures_add_up() {
    let model = load("kagan2013_compartmental");
    let table = model
        .simulate(&Run::new(model.parameters()), &SolverSettings::default())
        .unwrap();
    let lip = table.column("C_LIP_AmB").unwrap();
    let nonlip = table.column("C_nonlip_AmB").unwrap();
    let total = table.column("C_AmB").unwrap();
    let a_c = table.column("A_c").unwrap();
    for i in 0..table.len() {
        assert_eq!(total[i], lip[i] + nonlip[i]);
        assert_relative_eq!(nonlip[i], a_c[i] / (8.52e-1 * 0.25));
    }
}

#[test]
fn mihaila_mrna_reaches_steady_state() {
    let model = load("mihaila2017");
    let table = model
        .simulate(&Run::new(model.parameters()), &SolverSettings::default())
        .unwrap();
    assert_eq!(table.len(), 25);
    let m = table.column("M").unwrap();
    assert_eq!(m[0], 0.0);
    // k8 / k9 copies
    assert_relative_eq!(m[24], 100.0, max_relative = 1e-5);
}

#[test]
fn mihaila_ode_local_is_captured() {
    let mut spec = fixture("mihaila2017");
    spec.compartments[0].init = Some(ExpressionOrNumber::Number(1e3));
    spec.compartments[3].init = Some(ExpressionOrNumber::Number(1e4));
    let model = ModelDefinition::from_spec(&spec).unwrap();
    let table = model
        .simulate(&Run::new(model.parameters()), &SolverSettings::default())
        .unwrap();
    let n = table.column("N").unwrap();
    let n_molcount = table.column("N_molcount").unwrap();
    for (n, count) in n.iter().zip(&n_molcount) {
        assert_relative_eq!(*count, n * 1e-9 * 1.4e-12 * 6.02e23, max_relative = 1e-12);
    }
    assert!(n_molcount[24] > 0.0);
    assert!(table
        .rows()
        .iter()
        .all(|r| r.states.iter().all(|v| v.is_finite())));
}

#[test]
fn apgar_lnp_leaves_plasma() {
    let model = load("apgar2018_model2");
    let table = model
        .simulate(&Run::new(model.parameters()), &SolverSettings::default())
        .unwrap();
    assert_eq!(table.len(), 25921);
    let plasma = table.column("PlasmaDrug").unwrap();
    assert_relative_eq!(plasma[0], 0.3 * 0.4);
    // redistribution from LNPp dominates once plasma is nearly empty
    assert!(plasma[..100].windows(2).all(|w| w[1] < w[0]));
    assert!(plasma[25920] < 1e-3 * plasma[0]);
    assert!(table
        .rows()
        .iter()
        .all(|r| r.states.iter().chain(&r.captures).all(|v| v.is_finite())));
    let protein = table.column("protein").unwrap();
    assert!(protein[25920] > protein[0]);
}

#[test]
fn varga_forcing_is_recomputed_at_report_times() {
    let model = load("varga_v3");
    let table = model
        .simulate(&Run::new(model.parameters()), &SolverSettings::default())
        .unwrap();
    assert_eq!(table.len(), 433);
    let forcing = table.column("k_internalization").unwrap();
    assert_eq!(forcing[0], 9e14);
    assert_relative_eq!(forcing[1], 9e14 * (-10.0f64).exp(), max_relative = 1e-12);

    let nuclear = table.column("total_plasmid_nuclear").unwrap();
    let cytoplasmic = table.column("total_plasmid_cytoplasmic").unwrap();
    let total = table.column("total_plasmid").unwrap();
    for i in 0..table.len() {
        assert_eq!(total[i], nuclear[i] + cytoplasmic[i]);
        assert!(total[i].is_finite());
    }
    // almost everything has been internalized after the first report interval
    let internal = table.column("Complex_internal").unwrap();
    assert!(internal[1] > 0.99 * 9e14 * (1.0 - (-10.0f64).exp()) * (-0.1f64).exp());
}

#[test]
fn corpus_runs_in_one_batch() {
    let model = load("kagan2013_compartmental");
    let runs: Vec<Run> = [0.2, 0.25, 0.3, 0.35]
        .iter()
        .map(|&wt| Run::new(model.parameters()).covariate("wt", wt))
        .collect();
    let results = simulate_batch(
        &model,
        &runs,
        &SolverSettings::default(),
        &BatchOptions::new(),
    );
    for (result, wt) in results.iter().zip([0.2, 0.25, 0.3, 0.35]) {
        let table = result.as_ref().unwrap();
        let total = table.column("totaldrug").unwrap();
        assert_relative_eq!(total[0], 0.8 * wt, max_relative = 1e-12);
    }
}

#[test]
fn population_runs_differ_but_are_reproducible() {
    let model = load("kagan2013_compartmental");
    let sets = Population::lognormal(&model.parameters(), &[("kel", 0.3), ("L_kel", 0.3)], 8, 7)
        .unwrap();
    let runs: Vec<Run> = sets.into_iter().map(Run::new).collect();
    let settings = SolverSettings::default();
    let a = simulate_batch(&model, &runs, &settings, &BatchOptions::new());
    let b = simulate_batch(&model, &runs, &settings, &BatchOptions::new());
    let a: Vec<_> = a.into_iter().map(Result::unwrap).collect();
    let b: Vec<_> = b.into_iter().map(Result::unwrap).collect();
    assert_eq!(a, b);
    assert_ne!(a[0].column("A_c"), a[1].column("A_c"));
}
