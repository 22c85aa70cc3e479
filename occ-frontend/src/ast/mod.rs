//! Abstract Syntax Tree definitions for C
//!
//! This module defines the AST nodes consumed by IR generation. The AST is
//! produced by an external parser; IR generation only reads it.

pub mod expr;
pub mod ops;
pub mod stmt;

pub use expr::{Expr, ExprKind, IntSuffix};
pub use ops::{BinaryOp, UnaryOp};
pub use stmt::{BlockItem, ForInit, Statement, StatementKind};

use occ_common::SourceSpan;
use serde::{Deserialize, Serialize};

/// A translation unit: one source file's worth of top-level items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub items: Vec<Toplevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Toplevel {
    FunctionDef(FunctionDef),
    Decl(Decl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub specifiers: Vec<DeclSpecifier>,
    pub declarator: Declarator,
    /// K&R-style parameter declarations; rejected as unimplemented
    pub old_style_param_decls: Vec<Decl>,
    pub body: Statement,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    pub specifiers: Vec<DeclSpecifier>,
    pub init_declarators: Vec<InitDeclarator>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitDeclarator {
    pub declarator: Declarator,
    pub init: Option<Initializer>,
}

/// One entry in a declaration-specifier sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclSpecifier {
    StorageClass(StorageClass),
    TypeQualifier(TypeQualifier),
    FunctionSpecifier(FunctionSpecifier),
    TypeSpecifier(TypeSpecifier),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeQualifier {
    Const,
    Restrict,
    Volatile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionSpecifier {
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpecifier {
    /// A type keyword (`int`, `unsigned`, ...) or a typedef name
    Named(String),
    StructOrUnion(StructOrUnionSpecifier),
    Enum(EnumSpecifier),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructOrUnionSpecifier {
    pub is_union: bool,
    pub tag: Option<String>,
    /// None means a body-less reference to the tag
    pub fields: Option<Vec<FieldDecl>>,
    /// `__attribute__((...))` name, e.g. "packed"
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub specifiers: Vec<DeclSpecifier>,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSpecifier {
    pub tag: Option<String>,
    pub enumerators: Option<Vec<Enumerator>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declarator {
    Pointer(Box<Declarator>),
    Direct(DirectDeclarator),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DirectDeclarator {
    Identifier(String),
    /// Parenthesized declarator
    Nested(Box<Declarator>),
    Function {
        inner: Box<DirectDeclarator>,
        params: Vec<ParameterDecl>,
    },
    Array {
        inner: Box<DirectDeclarator>,
        len: Option<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterDecl {
    Decl {
        specifiers: Vec<DeclSpecifier>,
        /// None for an unnamed (abstract) parameter
        declarator: Option<Declarator>,
    },
    /// `...` - must be last
    Ellipsis,
}

/// A type name, as in casts and `sizeof(T)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeName {
    pub specifiers: Vec<DeclSpecifier>,
    pub declarator: Option<Declarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Expr(Expr),
    Brace(Vec<InitializerElement>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializerElement {
    pub designators: Vec<Designator>,
    pub init: Initializer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Designator {
    Field(String),
    Index(Expr),
}
