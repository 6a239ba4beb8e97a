//! Algebraic expressions used inside model definitions.
//!
//! Source text is tokenized and parsed into an [Expr] tree once, when a model is
//! loaded. The tree is then compiled against a section scope into a
//! [CompiledExpr], where every identifier is resolved to a [Slot] so evaluation
//! during integration is a plain tree walk over slices.

pub mod ast;
pub mod builtins;
pub mod compile;
pub mod parser;

pub use ast::{BinaryOp, Expr, ParseError, UnaryOp};
pub use builtins::Builtin;
pub use compile::{CompileError, CompiledExpr, Env, Lookup, Scope, Slot};

/// Identifiers that always denote the current solver time.
pub const TIME_NAMES: [&str; 3] = ["t", "TIME", "SOLVERTIME"];

pub fn is_time_name(name: &str) -> bool {
    TIME_NAMES.contains(&name)
}
