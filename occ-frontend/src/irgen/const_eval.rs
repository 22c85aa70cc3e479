//! Constant-expression evaluation
//!
//! Runs the expression lowerer in const context and checks that nothing was
//! appended to the IR: the builder constant-folds compile-time expressions,
//! so a constant expression lowers to an immediate or a global address
//! without touching any block.

use super::env::ExprContext;
use super::IrGen;
use crate::ast::Expr;
use crate::ir::{IrConst, ValueKind};
use occ_common::CompilerError;

impl IrGen<'_> {
    pub fn eval_constant_expr(&mut self, expr: &Expr) -> Result<IrConst, CompilerError> {
        let blocks_before = self.builder.block_count();
        let instrs_before = self.builder.instr_count();

        let term = self.gen_expr(expr, ExprContext::Const)?;

        if self.builder.block_count() != blocks_before
            || self.builder.instr_count() != instrs_before
        {
            return Err(CompilerError::semantic(
                "expression is not constant",
                expr.span.clone(),
            ));
        }

        match term.value.kind {
            ValueKind::Const(value) => Ok(IrConst::Int {
                ty: self.env.types.c_type_to_ir(term.ctype)?,
                value,
            }),
            ValueKind::Global(id) => Ok(IrConst::Global(Some(id))),
            _ => Err(CompilerError::semantic(
                "expression is not constant",
                expr.span.clone(),
            )),
        }
    }

    /// A constant expression that must be an integer, e.g. an array length
    /// or a case label
    pub fn eval_constant_int(&mut self, expr: &Expr) -> Result<u64, CompilerError> {
        match self.eval_constant_expr(expr)? {
            IrConst::Int { value, .. } => Ok(value),
            _ => Err(CompilerError::semantic(
                "integer constant expression required",
                expr.span.clone(),
            )),
        }
    }
}
