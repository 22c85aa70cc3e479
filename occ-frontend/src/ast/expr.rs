//! Expression AST nodes

use super::ops::{BinaryOp, UnaryOp};
use super::{InitializerElement, TypeName};
use occ_common::SourceSpan;
use serde::{Deserialize, Serialize};

/// An expression with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

impl Expr {
    pub fn new(kind: ExprKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }
}

/// Suffix-derived type hint on an integer literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntSuffix {
    None,
    Unsigned,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Identifier(String),
    IntLiteral {
        value: u64,
        suffix: IntSuffix,
    },
    /// Byte content without the NUL terminator
    StringLiteral(Vec<u8>),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs = rhs`, or `lhs op= rhs` when `op` is present
    Assign {
        op: Option<BinaryOp>,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    DotField {
        base: Box<Expr>,
        field: String,
    },
    ArrowField {
        base: Box<Expr>,
        field: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    Cast {
        type_name: TypeName,
        operand: Box<Expr>,
    },
    SizeofExpr(Box<Expr>),
    SizeofType(TypeName),
    CompoundLiteral {
        type_name: TypeName,
        elements: Vec<InitializerElement>,
    },
    /// `__builtin_va_arg(list, T)` - the only builtin with its own syntax
    BuiltinVaArg {
        list: Box<Expr>,
        type_name: TypeName,
    },
    Comma {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}
