//! Lowering environment: scopes, bindings, terms
//!
//! The environment is threaded mutably through the whole lowering pass.
//! Scopes form a lexical stack; lookups walk from the innermost outward.

use crate::ir::{InstrRef, Value};
use crate::types::{TypeEnv, TypeRef};
use occ_common::{BlockId, CompilerError, GlobalId, SourceSpan};

/// A typed IR value. L-values carry a pointer to storage of the C type;
/// r-values carry the value directly, except that aggregates and functions
/// always travel as pointers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub ctype: TypeRef,
    pub value: Value,
}

/// The role an expression plays at its use site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Lvalue,
    Rvalue,
    Const,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// Enumerators; their term value is an immediate
    pub constant: bool,
    pub term: Term,
}

/// One `case` or `default` of the switch currently being lowered
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub is_default: bool,
    /// Bit pattern of the case constant; None for default
    pub value: Option<u64>,
    pub block: BlockId,
}

#[derive(Debug, Clone)]
pub struct GotoLabel {
    pub name: String,
    pub block: BlockId,
}

/// A goto whose target label had not been seen yet; the branch is patched
/// at end of function
#[derive(Debug, Clone)]
pub struct GotoFixup {
    pub label: String,
    pub instr: InstrRef,
    pub span: SourceSpan,
}

/// An `inline` function whose body is deferred until a matching
/// `extern inline` redeclaration arrives
#[derive(Debug, Clone, Copy)]
pub struct InlineFunction {
    pub global: GlobalId,
    pub function_type: TypeRef,
    /// Index of the definition in the translation unit's item list
    pub def_index: usize,
}

pub struct Env {
    scopes: Vec<Vec<Binding>>,
    pub types: TypeEnv,
    /// The C function type of the function being lowered
    pub current_function_type: Option<TypeRef>,
    pub inline_functions: Vec<InlineFunction>,
    /// Case labels of the innermost switch; None outside any switch
    pub case_labels: Option<Vec<SwitchCase>>,
    pub goto_labels: Vec<GotoLabel>,
    pub goto_fixups: Vec<GotoFixup>,
    pub break_target: Option<BlockId>,
    pub continue_target: Option<BlockId>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
            types: TypeEnv::new(),
            current_function_type: None,
            inline_functions: Vec::new(),
            case_labels: None,
            goto_labels: Vec::new(),
            goto_fixups: Vec::new(),
            break_target: None,
            continue_target: None,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1);
        self.scopes.pop();
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().find(|b| b.name == name))
    }

    /// Bind in the current scope; duplicates in the same scope are an error
    pub fn bind(&mut self, binding: Binding, span: &SourceSpan) -> Result<(), CompilerError> {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.iter().any(|b| b.name == binding.name) {
            return Err(CompilerError::semantic(
                format!("duplicate identifier '{}'", binding.name),
                span.clone(),
            ));
        }
        scope.push(binding);
        Ok(())
    }

    /// Bind in the global scope. Globals may legally be declared more than
    /// once, so an existing binding is replaced.
    pub fn bind_global(&mut self, binding: Binding) {
        let scope = &mut self.scopes[0];
        if let Some(existing) = scope.iter_mut().find(|b| b.name == binding.name) {
            *existing = binding;
        } else {
            scope.push(binding);
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrType;

    fn dummy_binding(name: &str) -> Binding {
        Binding {
            name: name.to_string(),
            constant: false,
            term: Term {
                ctype: TypeEnv::new().int_type,
                value: Value::const_int(IrType::Int { bits: 32 }, 0),
            },
        }
    }

    #[test]
    fn test_scope_shadowing_and_popping() {
        let mut env = Env::new();
        let span = SourceSpan::dummy();
        env.bind(dummy_binding("x"), &span).unwrap();

        env.push_scope();
        env.bind(dummy_binding("x"), &span).unwrap();
        assert!(env.lookup("x").is_some());
        env.pop_scope();

        assert!(env.lookup("x").is_some());
        assert!(env.lookup("y").is_none());
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut env = Env::new();
        let span = SourceSpan::dummy();
        env.push_scope();
        env.bind(dummy_binding("x"), &span).unwrap();
        assert!(env.bind(dummy_binding("x"), &span).is_err());
    }

    #[test]
    fn test_global_rebinding_is_allowed() {
        let mut env = Env::new();
        env.bind_global(dummy_binding("f"));
        env.bind_global(dummy_binding("f"));
        assert!(env.lookup("f").is_some());
    }
}
