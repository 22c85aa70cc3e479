//! Statement AST nodes

use super::expr::Expr;
use super::Decl;
use occ_common::SourceSpan;
use serde::{Deserialize, Serialize};

/// A statement with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: SourceSpan,
}

impl Statement {
    pub fn new(kind: StatementKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockItem {
    Decl(Decl),
    Statement(Statement),
}

/// The init clause of a `for` statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInit {
    Decl(Decl),
    Expr(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    Empty,
    Compound(Vec<BlockItem>),
    Expr(Expr),
    If {
        condition: Expr,
        then_statement: Box<Statement>,
        else_statement: Option<Box<Statement>>,
    },
    While {
        condition: Expr,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expr,
    },
    For {
        init: ForInit,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Statement>,
    },
    Switch {
        value: Expr,
        body: Box<Statement>,
    },
    Case {
        value: Expr,
        body: Box<Statement>,
    },
    /// Labeled statement; a label named "default" is the default case of
    /// the enclosing switch (the grammar parses it like any other label)
    Labeled {
        label: String,
        body: Box<Statement>,
    },
    Goto(String),
    Break,
    Continue,
    Return(Option<Expr>),
}
