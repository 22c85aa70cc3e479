//! Short-circuit logic, ternary, sizeof, string and compound literals

use super::super::env::{ExprContext, Term};
use super::super::IrGen;
use crate::ast::{Expr, Initializer, InitializerElement, TypeName};
use crate::ir::{IrCmp, IrConst, Linkage, Value};
use crate::types::{CType, TypeRef};
use occ_common::{CompilerError, SourceSpan};

impl IrGen<'_> {
    /// `&&` and `||` short-circuit through the CFG and merge with a
    /// two-way phi: the left predecessor contributes the literal outcome,
    /// the right predecessor contributes `rhs != 0`.
    pub(super) fn gen_logical(
        &mut self,
        is_or: bool,
        lhs_expr: &Expr,
        rhs_expr: &Expr,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let rhs_block = self
            .builder
            .add_block(if is_or { "or.rhs" } else { "and.rhs" })?;
        let after_block = self
            .builder
            .add_block(if is_or { "or.after" } else { "and.after" })?;

        let lhs = self.gen_expr(lhs_expr, ExprContext::Rvalue)?;
        if !self.env.types.is_integer(lhs.ctype) {
            return Err(CompilerError::unimplemented(
                "non-integer operand of a logical operator",
                span.clone(),
            ));
        }
        if is_or {
            self.builder.build_cond(lhs.value, after_block, rhs_block)?;
        } else {
            self.builder.build_cond(lhs.value, rhs_block, after_block)?;
        }
        // Lowering the left side may have moved the current block
        let lhs_resultant_block = self.builder.current_block;

        self.builder.set_current_block(rhs_block);
        let rhs = self.gen_expr(rhs_expr, ExprContext::Rvalue)?;
        if !self.env.types.is_integer(rhs.ctype) {
            return Err(CompilerError::unimplemented(
                "non-integer operand of a logical operator",
                span.clone(),
            ));
        }
        let rhs_ir = self.env.types.c_type_to_ir(rhs.ctype)?;
        let rhs_as_bool =
            self.builder
                .build_cmp(IrCmp::Neq, rhs.value, Value::const_int(rhs_ir, 0))?;
        self.builder.build_branch(after_block)?;
        let rhs_resultant_block = self.builder.current_block;

        let int_type = self.env.types.int_type;
        let int_ir = self.env.types.c_type_to_ir(int_type)?;
        self.builder.set_current_block(after_block);
        let phi = self.builder.build_phi(int_ir, 2)?;
        self.builder.phi_set_param(
            phi,
            0,
            lhs_resultant_block,
            Value::const_int(int_ir, is_or as u64),
        )?;
        self.builder
            .phi_set_param(phi, 1, rhs_resultant_block, rhs_as_bool)?;

        Ok(Term {
            ctype: int_type,
            value: phi,
        })
    }

    /// `?:` lowers each branch in its own block, converts the branch
    /// values in their predecessor blocks, then phi-merges
    pub(super) fn gen_conditional(
        &mut self,
        condition: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let then_block = self.builder.add_block("ternary.then")?;
        let else_block = self.builder.add_block("ternary.else")?;
        let after_block = self.builder.add_block("ternary.after")?;

        let condition_term = self.gen_expr(condition, ExprContext::Rvalue)?;
        if !self.env.types.is_integer(condition_term.ctype) {
            return Err(CompilerError::unimplemented(
                "non-integer ternary condition",
                span.clone(),
            ));
        }
        self.builder
            .build_cond(condition_term.value, then_block, else_block)?;

        self.builder.set_current_block(then_block);
        let mut then_term = self.gen_expr(then_expr, ExprContext::Rvalue)?;
        then_term.ctype = self.env.types.decay(then_term.ctype);
        let then_resultant_block = self.builder.current_block;

        self.builder.set_current_block(else_block);
        let mut else_term = self.gen_expr(else_expr, ExprContext::Rvalue)?;
        else_term.ctype = self.env.types.decay(else_term.ctype);
        let else_resultant_block = self.builder.current_block;

        // TODO: the remaining conversions of C99 6.5.15
        let mut result_type = then_term.ctype;
        let both_int = self.env.types.is_integer(then_term.ctype)
            && self.env.types.is_integer(else_term.ctype);
        if both_int {
            self.arithmetic_conversions_with_blocks(
                &mut then_term,
                then_resultant_block,
                &mut else_term,
                else_resultant_block,
            )?;
            result_type = then_term.ctype;
        } else {
            let then_pointee = self.env.types.pointee(then_term.ctype);
            let else_pointee = self.env.types.pointee(else_term.ctype);
            let either_void_ptr = [then_pointee, else_pointee].iter().any(|p| {
                p.is_some_and(|p| matches!(self.env.types.get(p), CType::Void))
            });
            if then_pointee.is_some() && else_pointee.is_some() && either_void_ptr {
                // IR pointers are untyped, so this conversion is a no-op
                let void_type = self.env.types.void_type;
                result_type = self.env.types.pointer_to(void_type);
            } else if !self.env.types.type_eq(then_term.ctype, else_term.ctype) {
                return Err(CompilerError::semantic(
                    "incompatible ternary branch types",
                    span.clone(),
                ));
            }
        }

        // Branch only after conversions: converting may add instructions
        // to the predecessor blocks
        self.builder.set_current_block(then_resultant_block);
        self.builder.build_branch(after_block)?;
        self.builder.set_current_block(else_resultant_block);
        self.builder.build_branch(after_block)?;

        self.builder.set_current_block(after_block);
        let phi = self.builder.build_phi(then_term.value.ty, 2)?;
        self.builder
            .phi_set_param(phi, 0, then_resultant_block, then_term.value)?;
        self.builder
            .phi_set_param(phi, 1, else_resultant_block, else_term.value)?;

        Ok(Term {
            ctype: result_type,
            value: phi,
        })
    }

    /// `sizeof <expr>`: lower the operand into a throwaway function to
    /// learn its type without committing instructions, then discard
    pub(super) fn gen_sizeof_expr(&mut self, operand: &Expr) -> Result<Term, CompilerError> {
        let saved_function = self.builder.current_function.take();
        let saved_block = self.builder.current_block;
        self.builder.start_function();

        let term_result = self.gen_expr(operand, ExprContext::Rvalue);

        self.builder.current_function = saved_function;
        self.builder.set_current_block(saved_block);

        let term = term_result?;
        self.gen_sizeof_value(term.ctype, &operand.span)
    }

    pub(super) fn gen_sizeof_value(
        &mut self,
        ty: TypeRef,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let size = self
            .env
            .types
            .size_of(&self.builder.trans_unit, ty)
            .map_err(|_| CompilerError::semantic("sizeof an incomplete type", span.clone()))?;
        let size_type = self.env.types.size_type;
        let size_ir = self.env.types.c_type_to_ir(size_type)?;
        Ok(Term {
            ctype: size_type,
            value: Value::const_int(size_ir, size),
        })
    }

    /// A string literal becomes a local-linkage global holding the bytes
    /// plus the NUL terminator
    pub(super) fn gen_string_literal(&mut self, bytes: &[u8]) -> Result<Term, CompilerError> {
        let name = format!(
            "__string_literal_{:x}",
            self.builder.trans_unit.globals.len()
        );

        let char_type = self.env.types.char_type;
        let char_ir = self.env.types.c_type_to_ir(char_type)?;
        let result_type = self
            .env
            .types
            .array_of(&mut self.builder.trans_unit, char_type)?;
        let length = bytes.len() as u64 + 1;
        self.env
            .types
            .set_array_length(&mut self.builder.trans_unit, result_type, length)?;
        let ir = self.env.types.c_type_to_ir(result_type)?;

        let id = self.builder.trans_unit.add_var(&name, ir);
        let elems = bytes
            .iter()
            .copied()
            .chain(std::iter::once(0))
            .map(|byte| IrConst::Int {
                ty: char_ir,
                value: u64::from(byte),
            })
            .collect();
        let global = self.builder.trans_unit.global_mut(id);
        global.linkage = Linkage::Local;
        global.init = Some(IrConst::Array { ty: ir, elems });

        Ok(Term {
            ctype: result_type,
            value: Value::global(id),
        })
    }

    /// A compound literal allocates a local of the given type and runs the
    /// initializer compiler against it; the term is the local's address
    pub(super) fn gen_compound_literal(
        &mut self,
        type_name: &TypeName,
        elements: &[InitializerElement],
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let ty = self.type_name_to_c_type(type_name, span)?;
        let init = Initializer::Brace(elements.to_vec());
        self.infer_array_size_from_initializer(Some(&init), ty)?;

        let ir = self.env.types.c_type_to_ir(ty)?;
        let local = self.builder.build_local(ir)?;
        let term = Term {
            ctype: ty,
            value: local,
        };
        self.gen_initializer(term, &init, span)?;
        Ok(term)
    }
}
