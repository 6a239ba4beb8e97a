//! Name resolution for model sections.
//!
//! Every declared name lives in one [Namespace]. A [SectionScope] decides what a
//! name resolves to from a particular point in the model: which blocks are
//! visible, and whether a local is declared before or after the point of use.

use std::collections::HashMap;

use crate::error::{CaptureError, DefinitionError};
use crate::expr::{is_time_name, CompileError, CompiledExpr, Expr, Lookup, Scope, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decl {
    Compartment(usize),
    Parameter(usize),
    Covariate(usize),
    Main(usize),
    OdeLocal(usize),
    Capture(usize),
}

/// All names declared by a model, with the sizes of the local blocks.
#[derive(Debug, Default)]
pub(crate) struct Namespace {
    decls: HashMap<String, Decl>,
    n_main: usize,
    n_ode: usize,
}

impl Namespace {
    pub(crate) fn new(n_main: usize, n_ode: usize) -> Self {
        Self {
            decls: HashMap::new(),
            n_main,
            n_ode,
        }
    }

    pub(crate) fn declare(&mut self, name: &str, decl: Decl) -> Result<(), DefinitionError> {
        if is_time_name(name) {
            return Err(DefinitionError::ReservedName {
                name: name.to_string(),
            });
        }
        if self.decls.insert(name.to_string(), decl).is_some() {
            return Err(DefinitionError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Option<Decl> {
        self.decls.get(name).copied()
    }

    pub(crate) fn scope(&self, section: Section) -> SectionScope<'_> {
        SectionScope { ns: self, section }
    }
}

/// The point in the model an expression is compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    /// The MAIN assignment at this index.
    Main(usize),
    /// Initial values and dose amounts, evaluated after all of MAIN.
    Setup,
    /// The ODE local at this index.
    OdeLocal(usize),
    Derivative,
    /// The capture at this index.
    Capture(usize),
}

pub(crate) struct SectionScope<'a> {
    ns: &'a Namespace,
    section: Section,
}

impl SectionScope<'_> {
    fn dynamic(&self) -> bool {
        !matches!(self.section, Section::Main(_) | Section::Setup)
    }
}

impl Scope for SectionScope<'_> {
    fn lookup(&self, name: &str) -> Lookup {
        if is_time_name(name) {
            return if self.dynamic() {
                Lookup::Found(Slot::Time)
            } else {
                Lookup::NotInScope
            };
        }
        let Some(decl) = self.ns.get(name) else {
            return Lookup::Unknown;
        };
        let (m, o) = (self.ns.n_main, self.ns.n_ode);
        match (decl, self.section) {
            (Decl::Parameter(i), _) => Lookup::Found(Slot::Param(i)),
            (Decl::Covariate(i), _) => Lookup::Found(Slot::Covariate(i)),
            (Decl::Compartment(i), _) if self.dynamic() => Lookup::Found(Slot::State(i)),
            (Decl::Compartment(_), _) => Lookup::NotInScope,

            (Decl::Main(i), Section::Main(cur)) if i >= cur => Lookup::Forward,
            (Decl::Main(i), _) => Lookup::Found(Slot::Local(i)),

            (Decl::OdeLocal(_), Section::Main(_) | Section::Setup) => Lookup::Forward,
            (Decl::OdeLocal(j), Section::OdeLocal(cur)) if j >= cur => Lookup::Forward,
            (Decl::OdeLocal(j), _) => Lookup::Found(Slot::Local(m + j)),

            (Decl::Capture(k), Section::Capture(cur)) if k < cur => {
                Lookup::Found(Slot::Local(m + o + k))
            }
            (Decl::Capture(_), Section::Capture(_)) => Lookup::Forward,
            (Decl::Capture(_), _) => Lookup::NotInScope,
        }
    }
}

/// Parse and compile an expression belonging to MAIN, ODE, initial values or dosing.
pub(crate) fn compile_definition(
    src: &str,
    scope: &SectionScope,
    context: &str,
) -> Result<CompiledExpr, DefinitionError> {
    let expr = Expr::parse(src).map_err(|e| DefinitionError::Parse {
        context: context.to_string(),
        message: e.to_string(),
    })?;
    CompiledExpr::compile(&expr, scope).map_err(|e| {
        let context = context.to_string();
        match e {
            CompileError::Undefined(name) => DefinitionError::UndefinedIdentifier { name, context },
            CompileError::Forward(name) => DefinitionError::ForwardReference { name, context },
            CompileError::NotInScope(name) => DefinitionError::NotInScope { name, context },
            CompileError::UnknownFunction(name) => {
                DefinitionError::UnknownFunction { name, context }
            }
            CompileError::WrongArity {
                name,
                expected,
                found,
            } => DefinitionError::WrongArity {
                name,
                context,
                expected,
                found,
            },
        }
    })
}

/// Parse and compile a capture expression.
pub(crate) fn compile_capture(
    src: &str,
    scope: &SectionScope,
    capture: &str,
) -> Result<CompiledExpr, CaptureError> {
    let capture = capture.to_string();
    let expr = Expr::parse(src).map_err(|e| CaptureError::Parse {
        capture: capture.clone(),
        message: e.to_string(),
    })?;
    CompiledExpr::compile(&expr, scope).map_err(|e| match e {
        CompileError::Undefined(name) => CaptureError::UndefinedIdentifier { capture, name },
        // captures see every block, so a name that is not visible is a later capture
        CompileError::Forward(name) | CompileError::NotInScope(name) => {
            CaptureError::ForwardReference { capture, name }
        }
        CompileError::UnknownFunction(name) => CaptureError::Parse {
            capture,
            message: format!("unknown function '{}'", name),
        },
        CompileError::WrongArity {
            name,
            expected,
            found,
        } => CaptureError::Parse {
            capture,
            message: format!(
                "function '{}' takes {} argument(s), got {}",
                name, expected, found
            ),
        },
    })
}
