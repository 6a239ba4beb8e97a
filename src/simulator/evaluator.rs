use thiserror::Error;

use crate::expr::Env;
use crate::model::ModelDefinition;

/// A derivative evaluation produced a value that is not finite.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EvalError {
    #[error("derivative of compartment {compartment} is not finite at t = {time}")]
    NonFinite { compartment: usize, time: f64 },
}

/// Right-hand side of a system `dx/dt = f(t, x)`.
///
/// `locals` is a scratch buffer the system may use to store intermediate
/// values; after a call it reflects the evaluation at `(t, x)`.
pub trait OdeSystem {
    fn nstates(&self) -> usize;

    fn eval(&self, t: f64, x: &[f64], dx: &mut [f64], locals: &mut [f64])
        -> Result<(), EvalError>;
}

/// The derivative of a model for one run.
///
/// Borrows the run's parameter and covariate values together with the
/// zero-order input rates active over the current segment. MAIN locals must
/// already be stored at the start of the locals buffer.
pub struct Rhs<'a> {
    model: &'a ModelDefinition,
    params: &'a [f64],
    covariates: &'a [f64],
    rates: &'a [f64],
}

impl<'a> Rhs<'a> {
    pub fn new(
        model: &'a ModelDefinition,
        params: &'a [f64],
        covariates: &'a [f64],
        rates: &'a [f64],
    ) -> Self {
        Self {
            model,
            params,
            covariates,
            rates,
        }
    }
}

impl OdeSystem for Rhs<'_> {
    fn nstates(&self) -> usize {
        self.model.nstates()
    }

    fn eval(
        &self,
        t: f64,
        x: &[f64],
        dx: &mut [f64],
        locals: &mut [f64],
    ) -> Result<(), EvalError> {
        let offset = self.model.main().len();
        // ODE locals are recomputed on every call; forcing terms depend on t
        for (j, local) in self.model.ode_locals().iter().enumerate() {
            let value = local.expr.eval(&Env {
                t,
                x,
                p: self.params,
                cov: self.covariates,
                locals,
            });
            locals[offset + j] = value;
        }
        let env = Env {
            t,
            x,
            p: self.params,
            cov: self.covariates,
            locals,
        };
        for (i, (derivative, rate)) in self
            .model
            .derivatives()
            .iter()
            .zip(self.rates.iter())
            .enumerate()
        {
            let value = derivative.eval(&env) + rate;
            if !value.is_finite() {
                return Err(EvalError::NonFinite {
                    compartment: i,
                    time: t,
                });
            }
            dx[i] = value;
        }
        Ok(())
    }
}
