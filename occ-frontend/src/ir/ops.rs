//! IR operations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    /// Logical right shift. TODO: arithmetic shift for signed operands.
    Shr,
}

impl fmt::Display for IrBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrBinaryOp::Add => "add",
            IrBinaryOp::Sub => "sub",
            IrBinaryOp::Mul => "mul",
            IrBinaryOp::Div => "div",
            IrBinaryOp::Mod => "mod",
            IrBinaryOp::BitAnd => "and",
            IrBinaryOp::BitOr => "or",
            IrBinaryOp::BitXor => "xor",
            IrBinaryOp::Shl => "shl",
            IrBinaryOp::Shr => "shr",
        };
        write!(f, "{}", s)
    }
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrUnaryOp {
    Neg,
    BitNot,
}

impl fmt::Display for IrUnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrUnaryOp::Neg => write!(f, "neg"),
            IrUnaryOp::BitNot => write!(f, "not"),
        }
    }
}

/// Conversion operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastOp {
    /// Truncate an integer to a narrower width
    Trunc,
    /// Sign-extend an integer to a wider width
    Sext,
    /// Zero-extend an integer to a wider width
    Zext,
    /// Reinterpret between pointer and same-width integer, or retype
    Cast,
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CastOp::Trunc => "trunc",
            CastOp::Sext => "sext",
            CastOp::Zext => "zext",
            CastOp::Cast => "cast",
        };
        write!(f, "{}", s)
    }
}

/// Comparison predicates; produce a boolean integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrCmp {
    Eq,
    Neq,
    Sgt,
    Sgte,
    Slt,
    Slte,
    Ugt,
    Ugte,
    Ult,
    Ulte,
}

impl IrCmp {
    /// The unsigned counterpart of an ordered signed predicate
    pub fn to_unsigned(self) -> IrCmp {
        match self {
            IrCmp::Sgt => IrCmp::Ugt,
            IrCmp::Sgte => IrCmp::Ugte,
            IrCmp::Slt => IrCmp::Ult,
            IrCmp::Slte => IrCmp::Ulte,
            other => other,
        }
    }
}

impl fmt::Display for IrCmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrCmp::Eq => "eq",
            IrCmp::Neq => "neq",
            IrCmp::Sgt => "sgt",
            IrCmp::Sgte => "sgte",
            IrCmp::Slt => "slt",
            IrCmp::Slte => "slte",
            IrCmp::Ugt => "ugt",
            IrCmp::Ugte => "ugte",
            IrCmp::Ult => "ult",
            IrCmp::Ulte => "ulte",
        };
        write!(f, "{}", s)
    }
}
