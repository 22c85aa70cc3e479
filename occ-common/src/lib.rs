//! Oxide C Compiler - Common Types and Utilities
//!
//! This crate contains shared types, error definitions, and utilities
//! used across the components of the Oxide C compiler.

pub mod error;
pub mod source_loc;

pub use error::CompilerError;
pub use source_loc::{SourceLocation, SourceSpan};

/// Temporary value identifier within an IR function
pub type TempId = u32;

/// Basic block identifier within an IR function
pub type BlockId = u32;

/// Stack slot identifier within an IR function
pub type LocalId = u32;

/// Global symbol identifier within a translation unit
pub type GlobalId = u32;

/// Aggregate (struct/array) type identifier within a translation unit
pub type AggrId = u32;
