use crate::expr::ast::{BinaryOp, Expr, UnaryOp};
use crate::expr::builtins::Builtin;

/// Where an identifier's value lives at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    State(usize),
    Param(usize),
    Covariate(usize),
    Local(usize),
    Time,
}

/// Outcome of resolving a name in a section scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(Slot),
    /// The name is declared, but after the point of use.
    Forward,
    /// The name is declared, but is not visible from this section.
    NotInScope,
    Unknown,
}

pub trait Scope {
    fn lookup(&self, name: &str) -> Lookup;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Undefined(String),
    Forward(String),
    NotInScope(String),
    UnknownFunction(String),
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Values visible to an expression during evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    pub t: f64,
    pub x: &'a [f64],
    pub p: &'a [f64],
    pub cov: &'a [f64],
    pub locals: &'a [f64],
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Slot(Slot),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Builtin, Vec<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
}

/// An expression with every identifier resolved to a [Slot].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    root: Node,
}

impl CompiledExpr {
    pub fn compile(expr: &Expr, scope: &dyn Scope) -> Result<CompiledExpr, CompileError> {
        Ok(CompiledExpr {
            root: compile_node(expr, scope)?,
        })
    }

    /// A compiled literal.
    pub fn constant(value: f64) -> CompiledExpr {
        CompiledExpr {
            root: Node::Const(value),
        }
    }

    /// A bare reference to a single slot.
    pub fn slot(slot: Slot) -> CompiledExpr {
        CompiledExpr {
            root: Node::Slot(slot),
        }
    }

    #[inline(always)]
    pub fn eval(&self, env: &Env) -> f64 {
        eval_node(&self.root, env)
    }
}

fn compile_node(expr: &Expr, scope: &dyn Scope) -> Result<Node, CompileError> {
    let node = match expr {
        Expr::Number(v) => Node::Const(*v),
        Expr::Ident(name) => match scope.lookup(name) {
            Lookup::Found(slot) => Node::Slot(slot),
            Lookup::Forward => return Err(CompileError::Forward(name.clone())),
            Lookup::NotInScope => return Err(CompileError::NotInScope(name.clone())),
            Lookup::Unknown => return Err(CompileError::Undefined(name.clone())),
        },
        Expr::Unary { op, rhs } => {
            let rhs = compile_node(rhs, scope)?;
            match (op, rhs) {
                (UnaryOp::Neg, Node::Const(v)) => Node::Const(-v),
                (UnaryOp::Not, Node::Const(v)) => Node::Const(if v == 0.0 { 1.0 } else { 0.0 }),
                (UnaryOp::Neg, rhs) => Node::Neg(Box::new(rhs)),
                (UnaryOp::Not, rhs) => Node::Not(Box::new(rhs)),
            }
        }
        Expr::Binary { lhs, op, rhs } => {
            let lhs = compile_node(lhs, scope)?;
            let rhs = compile_node(rhs, scope)?;
            match (&lhs, &rhs) {
                (Node::Const(a), Node::Const(b)) => Node::Const(op.apply(*a, *b)),
                _ => Node::Binary(*op, Box::new(lhs), Box::new(rhs)),
            }
        }
        Expr::Call { name, args } => {
            let builtin = Builtin::from_name(name)
                .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
            let arity = builtin.arity();
            if !arity.contains(&args.len()) {
                return Err(CompileError::WrongArity {
                    name: name.clone(),
                    expected: *arity.start(),
                    found: args.len(),
                });
            }
            let args = args
                .iter()
                .map(|a| compile_node(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            let folded: Option<Vec<f64>> = args
                .iter()
                .map(|a| match a {
                    Node::Const(v) => Some(*v),
                    _ => None,
                })
                .collect();
            match folded {
                Some(values) => Node::Const(builtin.call(&values)),
                None => Node::Call(builtin, args),
            }
        }
        Expr::Ternary {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = compile_node(cond, scope)?;
            let then_branch = compile_node(then_branch, scope)?;
            let else_branch = compile_node(else_branch, scope)?;
            match cond {
                Node::Const(c) if c != 0.0 => then_branch,
                Node::Const(_) => else_branch,
                cond => Node::Ternary(
                    Box::new(cond),
                    Box::new(then_branch),
                    Box::new(else_branch),
                ),
            }
        }
    };
    Ok(node)
}

fn eval_node(node: &Node, env: &Env) -> f64 {
    match node {
        Node::Const(v) => *v,
        Node::Slot(slot) => match *slot {
            Slot::State(i) => env.x[i],
            Slot::Param(i) => env.p[i],
            Slot::Covariate(i) => env.cov[i],
            Slot::Local(i) => env.locals[i],
            Slot::Time => env.t,
        },
        Node::Neg(rhs) => -eval_node(rhs, env),
        Node::Not(rhs) => {
            if eval_node(rhs, env) == 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Node::Binary(op, lhs, rhs) => op.apply(eval_node(lhs, env), eval_node(rhs, env)),
        Node::Call(builtin, args) => {
            let mut values = [0.0; 3];
            for (v, a) in values.iter_mut().zip(args.iter()) {
                *v = eval_node(a, env);
            }
            builtin.call(&values[..args.len()])
        }
        Node::Ternary(cond, then_branch, else_branch) => {
            if eval_node(cond, env) != 0.0 {
                eval_node(then_branch, env)
            } else {
                eval_node(else_branch, env)
            }
        }
    }
}
