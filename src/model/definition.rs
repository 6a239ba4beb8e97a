use crate::data::{ParameterSet, TimeGrid};
use crate::error::{CaptureError, DefinitionError, MassbalError};
use crate::expr::{CompiledExpr, Lookup, Scope};
use crate::model::spec::{ExpressionOrNumber, ModelSpec};
use crate::model::validation::{
    compile_capture, compile_definition, Decl, Namespace, Section, SectionScope,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParameterDecl {
    pub(crate) name: String,
    pub(crate) default: Option<f64>,
    pub(crate) positive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CovariateDecl {
    pub(crate) name: String,
    pub(crate) default: Option<f64>,
}

/// A named compiled expression stored in the locals buffer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Local {
    pub(crate) name: String,
    pub(crate) expr: CompiledExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DoseRule {
    pub(crate) compartment: usize,
    pub(crate) amount: CompiledExpr,
    pub(crate) times: Vec<f64>,
    pub(crate) duration: Option<f64>,
}

/// A validated, compiled compartmental model.
///
/// Built once from a [ModelSpec] and shared read-only by every run. The locals
/// buffer used during evaluation is laid out as MAIN locals, then ODE locals,
/// then captures.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    name: String,
    compartments: Vec<String>,
    init: Vec<Option<CompiledExpr>>,
    parameters: Vec<ParameterDecl>,
    covariates: Vec<CovariateDecl>,
    main: Vec<Local>,
    ode_locals: Vec<Local>,
    derivatives: Vec<CompiledExpr>,
    captures: Vec<Local>,
    dosing: Vec<DoseRule>,
    grid: TimeGrid,
    non_negative: bool,
}

impl ModelDefinition {
    /// Parse a JSON model record and validate it.
    pub fn from_json(json: &str) -> Result<ModelDefinition, MassbalError> {
        let spec = ModelSpec::from_json(json)?;
        Self::from_spec(&spec)
    }

    /// Validate a model record and compile all of its expressions.
    ///
    /// Validation is fail-fast: the first problem found is returned and nothing
    /// is defaulted.
    pub fn from_spec(spec: &ModelSpec) -> Result<ModelDefinition, MassbalError> {
        let mut ns = Namespace::new(spec.main.len(), spec.ode.locals.len());

        for (i, c) in spec.compartments.iter().enumerate() {
            ns.declare(&c.name, Decl::Compartment(i))?;
        }
        for (i, p) in spec.parameters.iter().enumerate() {
            ns.declare(&p.name, Decl::Parameter(i))?;
        }
        for (i, c) in spec.covariates.iter().enumerate() {
            ns.declare(&c.name, Decl::Covariate(i))?;
        }
        for (i, a) in spec.main.iter().enumerate() {
            ns.declare(&a.name, Decl::Main(i))?;
        }
        for (i, a) in spec.ode.locals.iter().enumerate() {
            ns.declare(&a.name, Decl::OdeLocal(i))?;
        }
        for (i, c) in spec.captures.iter().enumerate() {
            // bare captures report an existing name and declare nothing
            if c.expr.is_some() {
                ns.declare(&c.name, Decl::Capture(i))?;
            }
            if spec.captures[..i].iter().any(|earlier| earlier.name == c.name) {
                return Err(DefinitionError::DuplicateName {
                    name: c.name.clone(),
                }
                .into());
            }
        }

        let main = spec
            .main
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let context = format!("MAIN '{}'", a.name);
                Ok(Local {
                    name: a.name.clone(),
                    expr: compile_definition(&a.expr, &ns.scope(Section::Main(i)), &context)?,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        let init = spec
            .compartments
            .iter()
            .map(|c| {
                c.init
                    .as_ref()
                    .map(|init| {
                        let context = format!("initial value of '{}'", c.name);
                        compile_value(init, &ns.scope(Section::Setup), &context)
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        let ode_locals = spec
            .ode
            .locals
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let context = format!("ODE local '{}'", a.name);
                Ok(Local {
                    name: a.name.clone(),
                    expr: compile_definition(&a.expr, &ns.scope(Section::OdeLocal(i)), &context)?,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        let derivatives = compile_derivatives(spec, &ns)?;

        let captures = spec
            .captures
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let scope = ns.scope(Section::Capture(i));
                let expr = match &c.expr {
                    Some(src) => compile_capture(src, &scope, &c.name)?,
                    None => compile_bare_capture(&c.name, &scope)?,
                };
                Ok(Local {
                    name: c.name.clone(),
                    expr,
                })
            })
            .collect::<Result<Vec<_>, CaptureError>>()?;

        let mut dosing = Vec::with_capacity(spec.dosing.len());
        for dose in &spec.dosing {
            let compartment = match ns.get(&dose.compartment) {
                Some(Decl::Compartment(i)) => i,
                _ => {
                    return Err(DefinitionError::UnknownDoseTarget {
                        name: dose.compartment.clone(),
                    }
                    .into())
                }
            };
            if let Some(&time) = dose.times.iter().find(|t| !t.is_finite()) {
                return Err(DefinitionError::InvalidDoseTime {
                    compartment: dose.compartment.clone(),
                    time,
                }
                .into());
            }
            let context = format!("dose into '{}'", dose.compartment);
            dosing.push(DoseRule {
                compartment,
                amount: compile_value(&dose.amount, &ns.scope(Section::Setup), &context)?,
                times: dose.times.clone(),
                duration: dose.duration,
            });
        }

        spec.grid.validate()?;

        Ok(ModelDefinition {
            name: spec.name.clone(),
            compartments: spec.compartments.iter().map(|c| c.name.clone()).collect(),
            init,
            parameters: spec
                .parameters
                .iter()
                .map(|p| ParameterDecl {
                    name: p.name.clone(),
                    default: p.value,
                    positive: p.positive,
                })
                .collect(),
            covariates: spec
                .covariates
                .iter()
                .map(|c| CovariateDecl {
                    name: c.name.clone(),
                    default: c.default,
                })
                .collect(),
            main,
            ode_locals,
            derivatives,
            captures,
            dosing,
            grid: spec.grid.clone(),
            non_negative: spec.non_negative,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compartment names in state-vector order.
    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    pub fn capture_names(&self) -> Vec<String> {
        self.captures.iter().map(|c| c.name.clone()).collect()
    }

    /// The declared parameters with their default values.
    ///
    /// Required parameters (no default) are present but unset.
    pub fn parameters(&self) -> ParameterSet {
        let mut set = ParameterSet::new();
        for p in &self.parameters {
            set.declare(&p.name, p.default);
        }
        set
    }

    /// The default reporting grid.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn non_negative(&self) -> bool {
        self.non_negative
    }

    pub fn nstates(&self) -> usize {
        self.compartments.len()
    }

    /// Length of the locals buffer (MAIN, ODE locals, captures).
    pub(crate) fn nlocals(&self) -> usize {
        self.main.len() + self.ode_locals.len() + self.captures.len()
    }

    pub(crate) fn parameter_decls(&self) -> &[ParameterDecl] {
        &self.parameters
    }

    pub(crate) fn covariate_decls(&self) -> &[CovariateDecl] {
        &self.covariates
    }

    pub(crate) fn main(&self) -> &[Local] {
        &self.main
    }

    pub(crate) fn init(&self) -> &[Option<CompiledExpr>] {
        &self.init
    }

    pub(crate) fn ode_locals(&self) -> &[Local] {
        &self.ode_locals
    }

    pub(crate) fn derivatives(&self) -> &[CompiledExpr] {
        &self.derivatives
    }

    pub(crate) fn captures(&self) -> &[Local] {
        &self.captures
    }

    pub(crate) fn dosing(&self) -> &[DoseRule] {
        &self.dosing
    }
}

fn compile_derivatives(
    spec: &ModelSpec,
    ns: &Namespace,
) -> Result<Vec<CompiledExpr>, DefinitionError> {
    let mut derivatives: Vec<Option<CompiledExpr>> = vec![None; spec.compartments.len()];
    for d in &spec.ode.derivatives {
        let target = match ns.get(&d.name) {
            Some(Decl::Compartment(i)) => Some(i),
            _ => match d.name.strip_prefix("dxdt_").and_then(|n| ns.get(n)) {
                Some(Decl::Compartment(i)) => Some(i),
                _ => None,
            },
        };
        let Some(i) = target else {
            return Err(DefinitionError::UnknownDerivativeTarget {
                name: d.name.clone(),
            });
        };
        let compartment = &spec.compartments[i].name;
        if derivatives[i].is_some() {
            return Err(DefinitionError::DuplicateDerivative {
                compartment: compartment.clone(),
            });
        }
        let context = format!("derivative of '{}'", compartment);
        derivatives[i] = Some(compile_definition(
            &d.expr,
            &ns.scope(Section::Derivative),
            &context,
        )?);
    }
    derivatives
        .into_iter()
        .zip(&spec.compartments)
        .map(|(d, c)| {
            d.ok_or_else(|| DefinitionError::MissingDerivative {
                compartment: c.name.clone(),
            })
        })
        .collect()
}

fn compile_value(
    value: &ExpressionOrNumber,
    scope: &SectionScope,
    context: &str,
) -> Result<CompiledExpr, DefinitionError> {
    match value {
        ExpressionOrNumber::Number(v) => Ok(CompiledExpr::constant(*v)),
        ExpressionOrNumber::Expression(src) => compile_definition(src, scope, context),
    }
}

/// A capture given by name alone reports an existing value under that name.
fn compile_bare_capture(name: &str, scope: &dyn Scope) -> Result<CompiledExpr, CaptureError> {
    match scope.lookup(name) {
        Lookup::Found(slot) => Ok(CompiledExpr::slot(slot)),
        Lookup::Forward | Lookup::NotInScope => Err(CaptureError::ForwardReference {
            capture: name.to_string(),
            name: name.to_string(),
        }),
        Lookup::Unknown => Err(CaptureError::UndefinedIdentifier {
            capture: name.to_string(),
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::spec::*;

    fn spec() -> ModelSpec {
        ModelSpec {
            name: "two_cmt".to_string(),
            grid: TimeGrid::until(10.0, 1.0),
            compartments: vec![
                CompartmentSpec {
                    name: "A".to_string(),
                    init: Some(ExpressionOrNumber::Expression("dose".to_string())),
                },
                CompartmentSpec {
                    name: "B".to_string(),
                    init: None,
                },
            ],
            parameters: vec![
                ParameterSpec {
                    name: "k".to_string(),
                    value: Some(0.1),
                    positive: false,
                },
                ParameterSpec {
                    name: "V".to_string(),
                    value: None,
                    positive: true,
                },
            ],
            covariates: vec![CovariateSpec {
                name: "wt".to_string(),
                default: Some(70.0),
            }],
            main: vec![Assignment::new("dose", "10 * wt")],
            ode: OdeSpec {
                locals: vec![Assignment::new("flux", "k * A")],
                derivatives: vec![
                    Assignment::new("dxdt_A", "-flux"),
                    Assignment::new("B", "flux"),
                ],
            },
            captures: vec![
                CaptureSpec {
                    name: "flux".to_string(),
                    expr: None,
                },
                CaptureSpec {
                    name: "CB".to_string(),
                    expr: Some("B / V".to_string()),
                },
            ],
            dosing: vec![],
            non_negative: false,
        }
    }

    #[test]
    fn compiles_a_valid_model() {
        let model = ModelDefinition::from_spec(&spec()).unwrap();
        assert_eq!(model.compartments(), &["A".to_string(), "B".to_string()]);
        assert_eq!(model.capture_names(), vec!["flux", "CB"]);
        assert_eq!(model.nlocals(), 4);
        let params = model.parameters();
        assert_eq!(params.get("k"), Some(0.1));
        assert!(params.contains("V"));
        assert_eq!(params.get("V"), None);
    }

    #[test]
    fn missing_derivative_is_rejected() {
        let mut spec = spec();
        spec.ode.derivatives.pop();
        let err = ModelDefinition::from_spec(&spec).unwrap_err();
        assert!(matches!(
            err,
            MassbalError::Definition(DefinitionError::MissingDerivative { ref compartment })
                if compartment == "B"
        ));
    }

    #[test]
    fn duplicate_derivative_is_rejected() {
        let mut spec = spec();
        spec.ode.derivatives.push(Assignment::new("A", "0"));
        let err = ModelDefinition::from_spec(&spec).unwrap_err();
        assert!(matches!(
            err,
            MassbalError::Definition(DefinitionError::DuplicateDerivative { .. })
        ));
    }

    #[test]
    fn compartments_are_not_visible_in_main() {
        let mut spec = spec();
        spec.main.push(Assignment::new("bad", "A * 2"));
        let err = ModelDefinition::from_spec(&spec).unwrap_err();
        assert!(matches!(
            err,
            MassbalError::Definition(DefinitionError::NotInScope { ref name, .. }) if name == "A"
        ));
    }

    #[test]
    fn capture_forward_reference_is_rejected() {
        let mut spec = spec();
        spec.captures.insert(
            0,
            CaptureSpec {
                name: "twice".to_string(),
                expr: Some("2 * CB".to_string()),
            },
        );
        let err = ModelDefinition::from_spec(&spec).unwrap_err();
        assert!(matches!(
            err,
            MassbalError::Capture(CaptureError::ForwardReference { ref name, .. }) if name == "CB"
        ));
    }

    #[test]
    fn unknown_dose_target_is_rejected() {
        let mut spec = spec();
        spec.dosing.push(DoseSpec {
            compartment: "gut".to_string(),
            amount: ExpressionOrNumber::Number(1.0),
            times: vec![0.0],
            duration: None,
        });
        let err = ModelDefinition::from_spec(&spec).unwrap_err();
        assert!(matches!(
            err,
            MassbalError::Definition(DefinitionError::UnknownDoseTarget { .. })
        ));
    }
}
