//! Assignment, compound assignment, and increment/decrement
//!
//! All three flow through `gen_assign_op`: load the left side when an
//! arithmetic operator is involved, apply it, convert to the target type,
//! and store. Struct and array assignment is a byte copy.

use super::super::env::{ExprContext, Term};
use super::super::IrGen;
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::ir::{IrType, Value};
use crate::types::CType;
use occ_common::{CompilerError, SourceSpan};

impl IrGen<'_> {
    /// Store `right` (combined with the loaded left side when `op` is
    /// present) through the `left` l-value. Returns the stored value and,
    /// for inc/dec, the value before the store.
    pub(crate) fn gen_assign_op(
        &mut self,
        left: Term,
        right: Term,
        op: Option<BinaryOp>,
        span: &SourceSpan,
    ) -> Result<(Term, Option<Term>), CompilerError> {
        let aggregate = matches!(
            self.env.types.get(left.ctype),
            CType::Struct { .. } | CType::Array { .. }
        );

        if aggregate {
            if !self.env.types.type_eq(left.ctype, right.ctype) {
                return Err(CompilerError::semantic(
                    "incompatible types in assignment",
                    span.clone(),
                ));
            }
            let size = self.env.types.size_of(&self.builder.trans_unit, left.ctype)?;
            let memcpy = self.builder.builtin_memcpy();
            let args = vec![
                left.value,
                right.value,
                Value::const_int(IrType::Int { bits: 64 }, size),
            ];
            self.builder.build_call(memcpy, IrType::Ptr, args)?;
            return Ok((right, None));
        }

        let mut result = right;
        let mut pre_assign_value = None;
        if let Some(op) = op {
            let ir = self.env.types.c_type_to_ir(left.ctype)?;
            let loaded = Term {
                ctype: left.ctype,
                value: self.builder.build_load(left.value, ir)?,
            };
            pre_assign_value = Some(loaded);
            result = self.gen_binary_operator(loaded, right, op, span)?;
        }

        result = self.convert_type(result, left.ctype)?;
        self.builder.build_store(left.value, result.value)?;
        Ok((result, pre_assign_value))
    }

    /// `++`/`--` in both positions: an assign-op with the constant 1,
    /// returning the new value (pre) or the old one (post)
    pub(super) fn gen_inc_dec(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let binary_op = match op {
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => BinaryOp::Add,
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => BinaryOp::Sub,
            _ => unreachable!(),
        };
        let is_pre = matches!(op, UnaryOp::PreIncrement | UnaryOp::PreDecrement);

        let ptr = self.gen_expr(operand, ExprContext::Lvalue)?;
        // TODO: the increment type should follow the operand type
        let one_type = self.env.types.int_type;
        let one_ir = self.env.types.c_type_to_ir(one_type)?;
        let one = Term {
            ctype: one_type,
            value: Value::const_int(one_ir, 1),
        };

        let (incremented, pre_value) = self.gen_assign_op(ptr, one, Some(binary_op), span)?;
        if is_pre {
            Ok(incremented)
        } else {
            Ok(pre_value.expect("assign-op with operator always loads"))
        }
    }
}
