//! Oxide C Compiler - Frontend
//!
//! This crate provides the IR-generation core of the Oxide C compiler:
//! - AST: the abstract syntax tree produced by an external parser
//! - Types: the C type system (interned pointers, tagged types, typedefs)
//! - IR: a typed, block-structured intermediate representation
//! - IR generation: the lowering pass from AST to IR

pub mod ast;
pub mod ir;
pub mod irgen;
pub mod types;

pub use ast::{Expr, ExprKind, Statement, StatementKind, Toplevel, TranslationUnit};
pub use ir::{IrBuilder, TransUnit};
pub use irgen::lower_translation_unit;
pub use occ_common::CompilerError;
pub use types::{CType, TypeEnv, TypeRef};
