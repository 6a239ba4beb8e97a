use crate::data::TimeGrid;
use crate::error::MassbalError;
use crate::model::spec::*;
use crate::model::ModelDefinition;

/// Fluent construction of a [ModelDefinition] from Rust code.
///
/// Sections may be added in any order; validation happens in
/// [ModelBuilder::build], exactly as for a JSON model.
///
/// ```
/// use massbal::prelude::*;
///
/// let model = ModelDefinition::builder("decay")
///     .compartment_with_init("A", 1.0)
///     .parameter("k", 0.1)
///     .derivative("A", "-k * A")
///     .build()
///     .unwrap();
/// assert_eq!(model.compartments(), &["A".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    spec: ModelSpec,
}

impl ModelDefinition {
    pub fn builder(name: &str) -> ModelBuilder {
        ModelBuilder::new(name)
    }
}

impl ModelBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            spec: ModelSpec {
                name: name.to_string(),
                grid: TimeGrid::default(),
                compartments: Vec::new(),
                parameters: Vec::new(),
                covariates: Vec::new(),
                main: Vec::new(),
                ode: OdeSpec::default(),
                captures: Vec::new(),
                dosing: Vec::new(),
                non_negative: false,
            },
        }
    }

    pub fn grid(mut self, grid: TimeGrid) -> Self {
        self.spec.grid = grid;
        self
    }

    pub fn compartment(mut self, name: &str) -> Self {
        self.spec.compartments.push(CompartmentSpec {
            name: name.to_string(),
            init: None,
        });
        self
    }

    pub fn compartment_with_init(mut self, name: &str, init: impl Into<ExpressionOrNumber>) -> Self {
        self.spec.compartments.push(CompartmentSpec {
            name: name.to_string(),
            init: Some(init.into()),
        });
        self
    }

    pub fn parameter(mut self, name: &str, value: f64) -> Self {
        self.spec.parameters.push(ParameterSpec {
            name: name.to_string(),
            value: Some(value),
            positive: false,
        });
        self
    }

    /// A parameter that must be set for every run.
    pub fn required_parameter(mut self, name: &str) -> Self {
        self.spec.parameters.push(ParameterSpec {
            name: name.to_string(),
            value: None,
            positive: false,
        });
        self
    }

    /// A parameter that must be strictly positive, such as a volume.
    pub fn positive_parameter(mut self, name: &str, value: f64) -> Self {
        self.spec.parameters.push(ParameterSpec {
            name: name.to_string(),
            value: Some(value),
            positive: true,
        });
        self
    }

    pub fn covariate(mut self, name: &str, default: Option<f64>) -> Self {
        self.spec.covariates.push(CovariateSpec {
            name: name.to_string(),
            default,
        });
        self
    }

    pub fn main(mut self, name: &str, expr: &str) -> Self {
        self.spec.main.push(Assignment::new(name, expr));
        self
    }

    pub fn ode_local(mut self, name: &str, expr: &str) -> Self {
        self.spec.ode.locals.push(Assignment::new(name, expr));
        self
    }

    pub fn derivative(mut self, compartment: &str, expr: &str) -> Self {
        self.spec
            .ode
            .derivatives
            .push(Assignment::new(compartment, expr));
        self
    }

    /// Report an existing compartment, parameter, covariate or local.
    pub fn capture(mut self, name: &str) -> Self {
        self.spec.captures.push(CaptureSpec {
            name: name.to_string(),
            expr: None,
        });
        self
    }

    pub fn capture_expr(mut self, name: &str, expr: &str) -> Self {
        self.spec.captures.push(CaptureSpec {
            name: name.to_string(),
            expr: Some(expr.to_string()),
        });
        self
    }

    pub fn bolus(
        mut self,
        compartment: &str,
        amount: impl Into<ExpressionOrNumber>,
        times: &[f64],
    ) -> Self {
        self.spec.dosing.push(DoseSpec {
            compartment: compartment.to_string(),
            amount: amount.into(),
            times: times.to_vec(),
            duration: None,
        });
        self
    }

    pub fn infusion(
        mut self,
        compartment: &str,
        amount: impl Into<ExpressionOrNumber>,
        times: &[f64],
        duration: f64,
    ) -> Self {
        self.spec.dosing.push(DoseSpec {
            compartment: compartment.to_string(),
            amount: amount.into(),
            times: times.to_vec(),
            duration: Some(duration),
        });
        self
    }

    pub fn non_negative(mut self, enabled: bool) -> Self {
        self.spec.non_negative = enabled;
        self
    }

    /// The record built so far.
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn build(self) -> Result<ModelDefinition, MassbalError> {
        ModelDefinition::from_spec(&self.spec)
    }
}
