//! Structured model record produced by an external loader.
//!
//! The types here mirror the sections of a declarative model file (grid,
//! compartments, parameters, MAIN, ODE, captures, dosing) without interpreting
//! them. [crate::ModelDefinition::from_spec] validates and compiles a [ModelSpec].

use serde::{Deserialize, Serialize};

use crate::data::TimeGrid;

/// Either an expression or a numeric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpressionOrNumber {
    Number(f64),
    Expression(String),
}

impl From<f64> for ExpressionOrNumber {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ExpressionOrNumber {
    fn from(s: &str) -> Self {
        Self::Expression(s.to_string())
    }
}

impl From<String> for ExpressionOrNumber {
    fn from(s: String) -> Self {
        Self::Expression(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSpec {
    pub name: String,
    /// Initial amount; may use parameters, covariates and MAIN locals.
    #[serde(default)]
    pub init: Option<ExpressionOrNumber>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    /// Default value. A parameter without a default must be set for every run.
    #[serde(default)]
    pub value: Option<f64>,
    /// Reject values `<= 0` at run setup (volumes, clearances used as divisors).
    #[serde(default)]
    pub positive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateSpec {
    pub name: String,
    #[serde(default)]
    pub default: Option<f64>,
}

/// `name = expr`, as found in MAIN and ODE blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub expr: String,
}

impl Assignment {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdeSpec {
    /// Temporaries recomputed at every derivative evaluation, in order.
    #[serde(default)]
    pub locals: Vec<Assignment>,
    /// One entry per compartment; `name` is the compartment (a `dxdt_` prefix is accepted).
    pub derivatives: Vec<Assignment>,
}

/// A reported output. Without `expr`, `name` must refer to an existing
/// compartment, parameter, covariate or local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSpec {
    pub name: String,
    #[serde(default)]
    pub expr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseSpec {
    pub compartment: String,
    pub amount: ExpressionOrNumber,
    pub times: Vec<f64>,
    /// Zero-order infusion duration; `None` means bolus.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default)]
    pub grid: TimeGrid,
    pub compartments: Vec<CompartmentSpec>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub covariates: Vec<CovariateSpec>,
    #[serde(default)]
    pub main: Vec<Assignment>,
    pub ode: OdeSpec,
    #[serde(default)]
    pub captures: Vec<CaptureSpec>,
    #[serde(default)]
    pub dosing: Vec<DoseSpec>,
    #[serde(default)]
    pub non_negative: bool,
}

impl ModelSpec {
    pub fn from_json(json: &str) -> Result<ModelSpec, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
