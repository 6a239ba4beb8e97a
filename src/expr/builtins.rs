//! Builtin functions available inside model expressions.
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Exp,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Sin,
    Cos,
    Tan,
    Pow,
    Min,
    Max,
    If,
}

impl Builtin {
    /// Look up a builtin by the name used in expressions.
    pub fn from_name(name: &str) -> Option<Builtin> {
        let b = match name {
            "exp" => Builtin::Exp,
            "ln" | "log" => Builtin::Ln,
            "log10" => Builtin::Log10,
            "log2" => Builtin::Log2,
            "sqrt" => Builtin::Sqrt,
            "abs" | "fabs" => Builtin::Abs,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "pow" | "powf" => Builtin::Pow,
            "min" | "fmin" => Builtin::Min,
            "max" | "fmax" => Builtin::Max,
            "if" => Builtin::If,
            _ => return None,
        };
        Some(b)
    }

    /// Allowed argument count.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Builtin::Pow | Builtin::Min | Builtin::Max => 2..=2,
            Builtin::If => 3..=3,
            _ => 1..=1,
        }
    }

    #[inline(always)]
    pub fn call(self, args: &[f64]) -> f64 {
        match self {
            Builtin::Exp => args[0].exp(),
            Builtin::Ln => args[0].ln(),
            Builtin::Log10 => args[0].log10(),
            Builtin::Log2 => args[0].log2(),
            Builtin::Sqrt => args[0].sqrt(),
            Builtin::Abs => args[0].abs(),
            Builtin::Floor => args[0].floor(),
            Builtin::Ceil => args[0].ceil(),
            Builtin::Round => args[0].round(),
            Builtin::Sin => args[0].sin(),
            Builtin::Cos => args[0].cos(),
            Builtin::Tan => args[0].tan(),
            Builtin::Pow => args[0].powf(args[1]),
            Builtin::Min => args[0].min(args[1]),
            Builtin::Max => args[0].max(args[1]),
            Builtin::If => {
                if args[0] != 0.0 {
                    args[1]
                } else {
                    args[2]
                }
            }
        }
    }
}
