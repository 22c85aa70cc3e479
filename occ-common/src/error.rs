//! Error handling for the Oxide C compiler
//!
//! This module defines the common error type used throughout the compiler.
//! Lowering is all-or-nothing per translation unit: the first error aborts
//! the unit and no partial IR is handed to callers.

use crate::source_loc::SourceSpan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main compiler error type that encompasses all phases of compilation
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompilerError {
    /// The program is ill-formed: duplicate or unknown identifiers,
    /// incompatible operand types, incomplete types where a size is
    /// required, redefinition of a complete tagged type, and so on.
    #[error("Semantic error at {span}: {message}")]
    Semantic { span: SourceSpan, message: String },

    /// The program uses a C feature this compiler does not support.
    #[error("Unimplemented at {span}: {construct}")]
    Unimplemented { span: SourceSpan, construct: String },

    /// An internal consistency violation; always a compiler bug.
    #[error("Internal compiler error: {message}")]
    Internal { message: String },
}

impl CompilerError {
    pub fn semantic(message: impl Into<String>, span: SourceSpan) -> Self {
        CompilerError::Semantic {
            span,
            message: message.into(),
        }
    }

    pub fn unimplemented(construct: impl Into<String>, span: SourceSpan) -> Self {
        CompilerError::Unimplemented {
            span,
            construct: construct.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_loc::SourceLocation;

    #[test]
    fn test_error_display() {
        let span = SourceSpan::from_location(SourceLocation::new("test.c", 3, 7));
        let err = CompilerError::semantic("unknown identifier 'x'", span);
        assert_eq!(
            err.to_string(),
            "Semantic error at test.c:3: unknown identifier 'x'"
        );

        let err = CompilerError::internal("block without terminator");
        assert_eq!(
            err.to_string(),
            "Internal compiler error: block without terminator"
        );
    }
}
