use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::grid::same_time;
use crate::data::{Bolus, Covariates, Event, Infusion, OutputRow, OutputTable, ParameterSet, TimeGrid};
use crate::error::{MassbalError, ParameterError};
use crate::expr::{CompiledExpr, Env};
use crate::model::ModelDefinition;
use crate::simulator::capture::CapturePipeline;
use crate::simulator::evaluator::Rhs;
use crate::simulator::integrator::{Integrator, SolverPhase};
use crate::simulator::scheduler::{stop_times, EventScheduler};
use crate::simulator::settings::SolverSettings;

/// The inputs of one simulation: parameter values, covariates and an optional
/// reporting grid overriding the model's default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    params: ParameterSet,
    covariates: Covariates,
    grid: Option<TimeGrid>,
}

impl Run {
    pub fn new(params: ParameterSet) -> Self {
        Self {
            params,
            covariates: Covariates::new(),
            grid: None,
        }
    }

    pub fn covariate(mut self, name: &str, value: f64) -> Self {
        self.covariates.insert(name, value);
        self
    }

    pub fn covariates(mut self, covariates: Covariates) -> Self {
        self.covariates = covariates;
        self
    }

    pub fn grid(mut self, grid: TimeGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn covariate_values(&self) -> &Covariates {
        &self.covariates
    }
}

/// Everything a run needs that is fixed before integration starts.
struct Setup {
    params: Vec<f64>,
    covariates: Vec<f64>,
    /// MAIN locals filled in, remaining slots zero.
    locals: Vec<f64>,
    x0: Vec<f64>,
    events: Vec<Event>,
    grid: TimeGrid,
    report_times: Vec<f64>,
}

impl Setup {
    fn new(model: &ModelDefinition, run: &Run) -> Result<Setup, ParameterError> {
        let params = resolve_parameters(model, &run.params)?;
        let covariates = resolve_covariates(model, &run.covariates)?;
        let grid = run.grid.clone().unwrap_or_else(|| model.grid().clone());
        let report_times = grid.report_times()?;

        let mut locals = vec![0.0; model.nlocals()];
        for (i, local) in model.main().iter().enumerate() {
            let value = eval_setup(&local.expr, grid.start, &params, &covariates, &locals);
            if !value.is_finite() {
                return Err(ParameterError::NonFinite {
                    name: local.name.clone(),
                    value,
                });
            }
            locals[i] = value;
        }

        let x0 = model
            .init()
            .iter()
            .zip(model.compartments())
            .map(|(init, name)| {
                let value = init.as_ref().map_or(0.0, |expr| {
                    eval_setup(expr, grid.start, &params, &covariates, &locals)
                });
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(ParameterError::NonFinite {
                        name: name.clone(),
                        value,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::new();
        for dose in model.dosing() {
            let compartment = &model.compartments()[dose.compartment];
            let amount = eval_setup(&dose.amount, grid.start, &params, &covariates, &locals);
            if !amount.is_finite() {
                return Err(ParameterError::InvalidDose {
                    compartment: compartment.clone(),
                    reason: format!("amount evaluated to {}", amount),
                });
            }
            if let Some(duration) = dose.duration {
                if !(duration.is_finite() && duration > 0.0) {
                    return Err(ParameterError::InvalidDose {
                        compartment: compartment.clone(),
                        reason: format!("infusion duration must be > 0, got {}", duration),
                    });
                }
            }
            for &time in &dose.times {
                if time < grid.start {
                    return Err(ParameterError::InvalidDose {
                        compartment: compartment.clone(),
                        reason: format!("time {} is before the grid start {}", time, grid.start),
                    });
                }
                if time > grid.end {
                    debug!(compartment = %compartment, time, "dropping dose after the horizon");
                    continue;
                }
                events.push(match dose.duration {
                    Some(duration) => {
                        Event::Infusion(Infusion::new(time, amount, dose.compartment, duration))
                    }
                    None => Event::Bolus(Bolus::new(time, amount, dose.compartment)),
                });
            }
        }

        Ok(Setup {
            params,
            covariates,
            locals,
            x0,
            events,
            grid,
            report_times,
        })
    }
}

fn eval_setup(expr: &CompiledExpr, t: f64, p: &[f64], cov: &[f64], locals: &[f64]) -> f64 {
    expr.eval(&Env {
        t,
        x: &[],
        p,
        cov,
        locals,
    })
}

/// Parameter values in declaration order, with defaults filled in.
fn resolve_parameters(
    model: &ModelDefinition,
    params: &ParameterSet,
) -> Result<Vec<f64>, ParameterError> {
    let decls = model.parameter_decls();
    if let Some(name) = params
        .names()
        .find(|name| !decls.iter().any(|d| d.name == *name))
    {
        return Err(ParameterError::Unknown {
            name: name.to_string(),
        });
    }
    decls
        .iter()
        .map(|decl| {
            let value = params
                .get(&decl.name)
                .or(decl.default)
                .ok_or_else(|| ParameterError::Missing {
                    name: decl.name.clone(),
                })?;
            if !value.is_finite() {
                return Err(ParameterError::NonFinite {
                    name: decl.name.clone(),
                    value,
                });
            }
            if decl.positive && value <= 0.0 {
                return Err(ParameterError::OutOfDomain {
                    name: decl.name.clone(),
                    value,
                    reason: "must be > 0".to_string(),
                });
            }
            Ok(value)
        })
        .collect()
}

fn resolve_covariates(
    model: &ModelDefinition,
    covariates: &Covariates,
) -> Result<Vec<f64>, ParameterError> {
    let decls = model.covariate_decls();
    if let Some(name) = covariates
        .names()
        .find(|name| !decls.iter().any(|d| d.name == *name))
    {
        return Err(ParameterError::UnknownCovariate {
            name: name.to_string(),
        });
    }
    decls
        .iter()
        .map(|decl| {
            let value = covariates.get(&decl.name).or(decl.default).ok_or_else(|| {
                ParameterError::MissingCovariate {
                    name: decl.name.clone(),
                }
            })?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(ParameterError::NonFinite {
                    name: decl.name.clone(),
                    value,
                })
            }
        })
        .collect()
}

impl ModelDefinition {
    /// Simulate one run and return a row for every report time.
    ///
    /// Events due at the grid start are applied before the first row is
    /// recorded, so a bolus at `t = 0` is visible at `t = 0`.
    pub fn simulate(
        &self,
        run: &Run,
        settings: &SolverSettings,
    ) -> Result<OutputTable, MassbalError> {
        settings.validate()?;
        let Setup {
            params,
            covariates,
            locals,
            x0,
            events,
            grid,
            report_times,
        } = Setup::new(self, run)?;

        debug!(
            model = %self.name(),
            start = grid.start,
            end = grid.end,
            reports = report_times.len(),
            events = events.len(),
            "starting run"
        );

        let mut scheduler = EventScheduler::new(&events);
        // infusions running past the horizon are never switched off
        let horizon = grid.horizon();
        let stops: Vec<_> = stop_times(&report_times, scheduler.times())
            .into_iter()
            .take_while(|s| s.time <= horizon || same_time(s.time, horizon))
            .collect();
        let mut rates = vec![0.0; self.nstates()];
        let mut integrator = Integrator::new(grid.start, DVector::from_vec(x0), locals, settings)
            .non_negative(self.non_negative());
        let captures = CapturePipeline::new(self, &params, &covariates);
        let mut table = OutputTable::new(
            self.compartments().to_vec(),
            self.capture_names(),
            report_times.len(),
        );

        for stop in stops {
            if stop.time > integrator.t() {
                let rhs = Rhs::new(self, &params, &covariates, &rates);
                integrator.advance_to(&rhs, stop.time)?;
            }
            scheduler.apply_due(stop.time, &mut integrator, &mut rates);
            if stop.report {
                integrator.set_phase(SolverPhase::Reporting);
                let rhs = Rhs::new(self, &params, &covariates, &rates);
                integrator.refresh(&rhs)?;
                let states: Vec<f64> = integrator.state().iter().copied().collect();
                let values = captures.evaluate(stop.time, &states, integrator.locals_mut());
                table.push(OutputRow {
                    time: stop.time,
                    states,
                    captures: values,
                });
            }
        }

        integrator.set_phase(SolverPhase::Done);
        let stats = integrator.statistics().clone();
        debug!(
            model = %self.name(),
            accepted = stats.accepted,
            rejected = stats.rejected,
            rhs_evals = stats.rhs_evals,
            "run finished"
        );
        table.set_statistics(stats);
        Ok(table)
    }
}
