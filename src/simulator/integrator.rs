//! Linearly implicit Rosenbrock 2(3) integrator for stiff systems.
//!
//! The method is the L-stable pair of Shampine and Reichelt (`ode23s`): one LU
//! factorization of `W = I - h·d·J` per attempt, three linear solves, and an
//! embedded third-order error estimate. Jacobian and time derivative are
//! formed by forward differences at each accepted point and reused while
//! attempts at that point are rejected.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{FailureReason, IntegrationFailure};
use crate::simulator::evaluator::{EvalError, OdeSystem};
use crate::simulator::settings::SolverSettings;

const D: f64 = 1.0 / (2.0 + std::f64::consts::SQRT_2);
const E32: f64 = 6.0 + std::f64::consts::SQRT_2;

const SAFETY: f64 = 0.8;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Where a run currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverPhase {
    Init,
    Stepping,
    Reporting,
    EventApplied,
    Done,
    Failed,
}

/// Work counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SolverStatistics {
    pub accepted: usize,
    pub rejected: usize,
    pub rhs_evals: usize,
    pub jacobian_evals: usize,
    pub lu_decompositions: usize,
}

struct Linearization {
    jac: DMatrix<f64>,
    dfdt: DVector<f64>,
}

enum Attempt {
    Accepted {
        y: DVector<f64>,
        f: DVector<f64>,
        err: f64,
    },
    /// `err` is `None` when no error estimate could be formed.
    Rejected { err: Option<f64> },
}

pub struct Integrator {
    settings: SolverSettings,
    non_negative: bool,
    t: f64,
    y: DVector<f64>,
    /// Derivative at `(t, y)`, valid when `fresh`.
    f0: DVector<f64>,
    fresh: bool,
    linearization: Option<Linearization>,
    /// Untruncated proposal for the next step.
    h: Option<f64>,
    locals: Vec<f64>,
    phase: SolverPhase,
    stats: SolverStatistics,
    started: Instant,
}

impl Integrator {
    pub fn new(t0: f64, y0: DVector<f64>, locals: Vec<f64>, settings: &SolverSettings) -> Self {
        let n = y0.len();
        Self {
            settings: settings.clone(),
            non_negative: false,
            t: t0,
            y: y0,
            f0: DVector::zeros(n),
            fresh: false,
            linearization: None,
            h: settings.h0,
            locals,
            phase: SolverPhase::Init,
            stats: SolverStatistics::default(),
            started: Instant::now(),
        }
    }

    /// Clamp negative amounts to zero after every accepted step and event.
    pub fn non_negative(mut self, enabled: bool) -> Self {
        self.non_negative = enabled;
        self.clamp();
        self
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.y
    }

    pub fn locals(&self) -> &[f64] {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut [f64] {
        &mut self.locals
    }

    pub fn phase(&self) -> SolverPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: SolverPhase) {
        self.phase = phase;
    }

    pub fn statistics(&self) -> &SolverStatistics {
        &self.stats
    }

    /// Add `amount` to compartment `input`.
    pub fn apply_bolus(&mut self, input: usize, amount: f64) {
        self.y[input] += amount;
        self.clamp();
        self.invalidate();
    }

    /// Mark the system as changed at the current point, e.g. after an input
    /// rate changed.
    pub fn invalidate(&mut self) {
        self.fresh = false;
        self.linearization = None;
        self.phase = SolverPhase::EventApplied;
    }

    /// Evaluate the derivative at the current accepted point.
    ///
    /// Afterwards the locals buffer holds the values belonging to `(t, y)`.
    pub fn refresh<S: OdeSystem>(&mut self, sys: &S) -> Result<(), IntegrationFailure> {
        match eval(sys, self.t, &self.y, &mut self.locals, &mut self.stats) {
            Ok(f) => {
                self.f0 = f;
                self.fresh = true;
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "derivative is not finite at an accepted point");
                Err(self.fail(FailureReason::NonFiniteDerivative))
            }
        }
    }

    /// Integrate until `t_stop`, landing on it exactly.
    pub fn advance_to<S: OdeSystem>(
        &mut self,
        sys: &S,
        t_stop: f64,
    ) -> Result<(), IntegrationFailure> {
        self.phase = SolverPhase::Stepping;
        let mut rejections = 0;
        while self.t < t_stop {
            if !self.fresh {
                self.refresh(sys)?;
            }
            let span = t_stop - self.t;
            let h_floor = self
                .settings
                .h_min
                .max(16.0 * f64::EPSILON * self.t.abs());
            let proposal = match self.h {
                Some(h) => h,
                None => self.initial_step(span),
            };
            let proposal = match self.settings.h_max {
                Some(h_max) => proposal.min(h_max),
                None => proposal,
            };
            let (h, truncated) = if proposal >= span || span - proposal <= h_floor {
                (span, true)
            } else {
                (proposal, false)
            };
            if !truncated && h < h_floor {
                return Err(self.fail(FailureReason::StepSizeUnderflow));
            }

            self.check_budgets()?;
            if self.linearization.is_none() {
                self.linearization = Some(self.linearize(sys)?);
            }

            match self.attempt(sys, h) {
                Attempt::Accepted { y, f, err } => {
                    self.t = if truncated { t_stop } else { self.t + h };
                    self.y = y;
                    self.f0 = f;
                    self.linearization = None;
                    self.stats.accepted += 1;
                    rejections = 0;

                    let next = h * step_factor(err);
                    self.h = Some(if truncated { next.max(proposal) } else { next });
                    if self.clamp() {
                        self.fresh = false;
                    }
                }
                Attempt::Rejected { err } => {
                    self.stats.rejected += 1;
                    rejections += 1;
                    let factor = err.map_or(0.5, |e| step_factor(e).min(0.5));
                    let next = h * factor;
                    trace!(t = self.t, h, ?err, "step rejected");
                    if rejections > self.settings.max_rejections {
                        return Err(self.fail(FailureReason::TooManyRejections));
                    }
                    if next < h_floor {
                        return Err(self.fail(FailureReason::StepSizeUnderflow));
                    }
                    self.h = Some(next);
                }
            }
        }
        Ok(())
    }

    /// One Rosenbrock attempt of size `h` from the current point.
    fn attempt<S: OdeSystem>(&mut self, sys: &S, h: f64) -> Attempt {
        const NO_ESTIMATE: Attempt = Attempt::Rejected { err: None };
        let Some(lin) = self.linearization.as_ref() else {
            return NO_ESTIMATE;
        };
        let n = self.y.len();
        let w = DMatrix::<f64>::identity(n, n) - &lin.jac * (h * D);
        self.stats.lu_decompositions += 1;
        let lu = w.lu();
        if !lu.is_invertible() {
            return NO_ESTIMATE;
        }
        let t_term = &lin.dfdt * (h * D);

        let Some(k1) = lu.solve(&(&self.f0 + &t_term)) else {
            return NO_ESTIMATE;
        };
        let y_half = &self.y + &k1 * (0.5 * h);
        let Ok(f1) = eval(
            sys,
            self.t + 0.5 * h,
            &y_half,
            &mut self.locals,
            &mut self.stats,
        ) else {
            return NO_ESTIMATE;
        };
        let Some(k2) = lu.solve(&(&f1 - &k1)) else {
            return NO_ESTIMATE;
        };
        let k2 = k2 + &k1;
        let y_new = &self.y + &k2 * h;
        let Ok(f2) = eval(sys, self.t + h, &y_new, &mut self.locals, &mut self.stats) else {
            return NO_ESTIMATE;
        };
        let rhs3 = &f2 - (&k2 - &f1) * E32 - (&k1 - &self.f0) * 2.0 + &t_term;
        let Some(k3) = lu.solve(&rhs3) else {
            return NO_ESTIMATE;
        };

        let err_vec = (&k1 - &k2 * 2.0 + &k3) * (h / 6.0);
        let err = error_norm(
            &err_vec,
            &self.y,
            &y_new,
            self.settings.atol,
            self.settings.rtol,
        );
        if !err.is_finite() || y_new.iter().any(|v| !v.is_finite()) {
            return NO_ESTIMATE;
        }
        if err <= 1.0 {
            Attempt::Accepted {
                y: y_new,
                f: f2,
                err,
            }
        } else {
            Attempt::Rejected { err: Some(err) }
        }
    }

    /// Forward-difference Jacobian and time derivative at the current point.
    fn linearize<S: OdeSystem>(&mut self, sys: &S) -> Result<Linearization, IntegrationFailure> {
        let n = self.y.len();
        let sqrt_eps = f64::EPSILON.sqrt();
        self.stats.jacobian_evals += 1;

        let mut jac = DMatrix::zeros(n, n);
        let mut yp = self.y.clone();
        for j in 0..n {
            let delta = sqrt_eps * self.y[j].abs().max(1.0);
            yp[j] = self.y[j] + delta;
            let fp = eval(sys, self.t, &yp, &mut self.locals, &mut self.stats);
            yp[j] = self.y[j];
            match fp {
                Ok(fp) => jac.set_column(j, &((fp - &self.f0) / delta)),
                Err(_) => return Err(self.fail(FailureReason::NonFiniteDerivative)),
            }
        }

        let dt = sqrt_eps * self.t.abs().max(1.0);
        let dfdt = match eval(sys, self.t + dt, &self.y, &mut self.locals, &mut self.stats) {
            Ok(ft) => (ft - &self.f0) / dt,
            Err(_) => return Err(self.fail(FailureReason::NonFiniteDerivative)),
        };
        Ok(Linearization { jac, dfdt })
    }

    /// Initial step from the size of the derivative relative to the state.
    fn initial_step(&self, span: f64) -> f64 {
        let threshold = self.settings.atol / self.settings.rtol;
        let rate = self
            .f0
            .iter()
            .zip(self.y.iter())
            .map(|(f, y)| (f / y.abs().max(threshold)).abs())
            .fold(0.0, f64::max);
        let rh = 1.25 * rate / self.settings.rtol.powf(1.0 / 3.0);
        let mut h = self.settings.h_max.unwrap_or(f64::INFINITY).min(span);
        if h * rh > 1.0 {
            h = 1.0 / rh;
        }
        h.max(self.settings.h_min)
    }

    fn check_budgets(&mut self) -> Result<(), IntegrationFailure> {
        if self.stats.accepted + self.stats.rejected >= self.settings.max_steps {
            return Err(self.fail(FailureReason::StepBudgetExceeded));
        }
        if let Some(limit) = self.settings.max_wall_time {
            if self.started.elapsed().as_secs_f64() > limit {
                return Err(self.fail(FailureReason::WallClockExceeded));
            }
        }
        Ok(())
    }

    /// Returns true when any component was clamped.
    fn clamp(&mut self) -> bool {
        if !self.non_negative {
            return false;
        }
        let mut clamped = false;
        for v in self.y.iter_mut() {
            if *v < 0.0 {
                *v = 0.0;
                clamped = true;
            }
        }
        clamped
    }

    fn fail(&mut self, reason: FailureReason) -> IntegrationFailure {
        self.phase = SolverPhase::Failed;
        debug!(t = self.t, %reason, "integration failed");
        IntegrationFailure {
            reason,
            time: self.t,
            state: self.y.iter().copied().collect(),
        }
    }
}

fn eval<S: OdeSystem>(
    sys: &S,
    t: f64,
    y: &DVector<f64>,
    locals: &mut [f64],
    stats: &mut SolverStatistics,
) -> Result<DVector<f64>, EvalError> {
    stats.rhs_evals += 1;
    let mut dy = DVector::zeros(y.len());
    sys.eval(t, y.as_slice(), dy.as_mut_slice(), locals)?;
    Ok(dy)
}

/// Weighted RMS norm with `sc_i = atol + rtol * max(|y_i|, |y_new_i|)`.
fn error_norm(
    err: &DVector<f64>,
    y: &DVector<f64>,
    y_new: &DVector<f64>,
    atol: f64,
    rtol: f64,
) -> f64 {
    if err.is_empty() {
        return 0.0;
    }
    let sum: f64 = err
        .iter()
        .zip(y.iter().zip(y_new.iter()))
        .map(|(e, (a, b))| {
            let sc = atol + rtol * a.abs().max(b.abs());
            (e / sc).powi(2)
        })
        .sum();
    (sum / err.len() as f64).sqrt()
}

fn step_factor(err: f64) -> f64 {
    if err == 0.0 {
        return MAX_FACTOR;
    }
    (SAFETY * err.powf(-1.0 / 3.0)).clamp(MIN_FACTOR, MAX_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Linear {
        a: DMatrix<f64>,
    }

    impl OdeSystem for Linear {
        fn nstates(&self) -> usize {
            self.a.nrows()
        }

        fn eval(
            &self,
            _t: f64,
            x: &[f64],
            dx: &mut [f64],
            _locals: &mut [f64],
        ) -> Result<(), EvalError> {
            let dxv = &self.a * DVector::from_column_slice(x);
            dx.copy_from_slice(dxv.as_slice());
            Ok(())
        }
    }

    /// Robertson's chemical kinetics problem.
    struct Robertson;

    impl OdeSystem for Robertson {
        fn nstates(&self) -> usize {
            3
        }

        fn eval(
            &self,
            _t: f64,
            x: &[f64],
            dx: &mut [f64],
            _locals: &mut [f64],
        ) -> Result<(), EvalError> {
            dx[0] = -0.04 * x[0] + 1e4 * x[1] * x[2];
            dx[2] = 3e7 * x[1] * x[1];
            dx[1] = -dx[0] - dx[2];
            Ok(())
        }
    }

    struct Forcing;

    impl OdeSystem for Forcing {
        fn nstates(&self) -> usize {
            1
        }

        fn eval(
            &self,
            t: f64,
            _x: &[f64],
            dx: &mut [f64],
            _locals: &mut [f64],
        ) -> Result<(), EvalError> {
            dx[0] = t.cos();
            Ok(())
        }
    }

    #[test]
    fn exponential_decay_matches_closed_form() {
        let sys = Linear {
            a: DMatrix::from_row_slice(1, 1, &[-0.5]),
        };
        let mut integrator = Integrator::new(
            0.0,
            DVector::from_vec(vec![2.0]),
            vec![],
            &SolverSettings::default(),
        );
        for stop in [1.0, 2.5, 10.0] {
            integrator.advance_to(&sys, stop).unwrap();
            assert_eq!(integrator.t(), stop);
            assert_relative_eq!(
                integrator.state()[0],
                2.0 * (-0.5 * stop).exp(),
                max_relative = 1e-4
            );
        }
        assert!(integrator.statistics().accepted > 0);
        assert_eq!(
            integrator.statistics().lu_decompositions,
            integrator.statistics().accepted + integrator.statistics().rejected
        );
    }

    #[test]
    fn robertson_conserves_mass() {
        let mut integrator = Integrator::new(
            0.0,
            DVector::from_vec(vec![1.0, 0.0, 0.0]),
            vec![],
            &SolverSettings::default(),
        );
        integrator.advance_to(&Robertson, 40.0).unwrap();
        let y = integrator.state();
        assert_relative_eq!(y.sum(), 1.0, epsilon = 1e-6);
        // reference value at t = 40
        assert_relative_eq!(y[0], 0.7158, epsilon = 1e-3);
    }

    #[test]
    fn non_autonomous_terms_use_the_time_derivative() {
        let mut integrator =
            Integrator::new(0.0, DVector::zeros(1), vec![], &SolverSettings::default());
        integrator.advance_to(&Forcing, 3.0).unwrap();
        assert_relative_eq!(integrator.state()[0], 3.0f64.sin(), epsilon = 1e-5);
    }

    #[test]
    fn stiff_linear_system_is_stable_with_large_steps() {
        // eigenvalues -1e9 and -1e-7
        let sys = Linear {
            a: DMatrix::from_row_slice(2, 2, &[-1e9, 0.0, 1e9, -1e-7]),
        };
        let mut integrator = Integrator::new(
            0.0,
            DVector::from_vec(vec![1.0, 0.0]),
            vec![],
            &SolverSettings::default(),
        );
        integrator.advance_to(&sys, 1e3).unwrap();
        let y = integrator.state();
        assert!(y[0].abs() < 1e-6);
        assert_relative_eq!(y[1], (-1e-7 * 1e3f64).exp(), max_relative = 1e-4);
        assert!(integrator.statistics().accepted < 5_000);
    }

    #[test]
    fn step_budget_is_enforced() {
        let sys = Linear {
            a: DMatrix::from_row_slice(1, 1, &[-1.0]),
        };
        let settings = SolverSettings::default().with_max_steps(3);
        let mut integrator =
            Integrator::new(0.0, DVector::from_vec(vec![1.0]), vec![], &settings);
        let err = integrator.advance_to(&sys, 100.0).unwrap_err();
        assert_eq!(err.reason, FailureReason::StepBudgetExceeded);
        assert_eq!(integrator.phase(), SolverPhase::Failed);
        assert!(err.time < 100.0);
        assert_eq!(err.state.len(), 1);
    }

    #[test]
    fn bolus_invalidates_the_current_point() {
        let sys = Linear {
            a: DMatrix::from_row_slice(1, 1, &[0.0]),
        };
        let mut integrator = Integrator::new(
            0.0,
            DVector::from_vec(vec![1.0]),
            vec![],
            &SolverSettings::default(),
        )
        .non_negative(true);
        integrator.apply_bolus(0, -5.0);
        assert_eq!(integrator.state()[0], 0.0);
        assert_eq!(integrator.phase(), SolverPhase::EventApplied);
        integrator.advance_to(&sys, 1.0).unwrap();
        assert_eq!(integrator.state()[0], 0.0);
    }
}
