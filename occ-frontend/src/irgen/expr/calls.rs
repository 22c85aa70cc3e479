//! Function call lowering
//!
//! Calls accept callees of function or pointer-to-function type. A struct
//! return is lowered per the ABI contract: the IR function returns void and
//! takes an implicit first pointer argument; the caller allocates a local
//! and reads the result from it. `__builtin_va_start` and
//! `__builtin_va_end` are recognized by name; `__builtin_va_arg` has its
//! own expression form and lowers through a runtime helper.

use super::super::env::{ExprContext, Term};
use super::super::IrGen;
use crate::ast::{Expr, ExprKind, TypeName};
use crate::ir::{IrType, Value};
use crate::types::{CType, TypeRef};
use occ_common::{CompilerError, SourceSpan};

impl IrGen<'_> {
    pub(super) fn gen_call(
        &mut self,
        callee_expr: &Expr,
        args: &[Expr],
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        if let ExprKind::Identifier(name) = &callee_expr.kind {
            match name.as_str() {
                "__builtin_va_start" => return self.gen_va_start(args, span),
                "__builtin_va_end" => {
                    // va_end is a no-op on this ABI; the result has void
                    // type so it cannot be used
                    return Ok(Term {
                        ctype: self.env.types.void_type,
                        value: Value::const_int(IrType::Void, 0),
                    });
                }
                _ => {}
            }
        }

        let mut callee = self.gen_expr(callee_expr, ExprContext::Rvalue)?;

        // A call through a function pointer behaves as if the pointee were
        // called directly
        if !matches!(self.env.types.get(callee.ctype), CType::Function { .. }) {
            let pointee = self.env.types.pointee(callee.ctype);
            match pointee {
                Some(p) if matches!(self.env.types.get(p), CType::Function { .. }) => {
                    callee.ctype = p;
                }
                _ => {
                    return Err(CompilerError::semantic(
                        "called value is not a function",
                        span.clone(),
                    ))
                }
            }
        }

        let (return_type, param_types) = match self.env.types.get(callee.ctype) {
            CType::Function { ret, params, .. } => (*ret, params.clone()),
            _ => unreachable!(),
        };

        let struct_ret = matches!(self.env.types.get(return_type), CType::Struct { .. });

        let mut arg_values = Vec::with_capacity(args.len() + usize::from(struct_ret));
        let mut local_for_ret_value = None;
        if struct_ret {
            let ret_ir = self.env.types.c_type_to_ir(return_type)?;
            let local = self.builder.build_local(ret_ir)?;
            arg_values.push(local);
            local_for_ret_value = Some(local);
        }

        for (i, arg) in args.iter().enumerate() {
            let mut arg_term = self.gen_expr(arg, ExprContext::Rvalue)?;
            // Arguments in declared parameter positions are converted to
            // the declared type; variadic tail arguments pass as-is
            if let Some(&param_type) = param_types.get(i) {
                arg_term = self.convert_type(arg_term, param_type)?;
            }
            arg_values.push(arg_term.value);
        }

        let return_ir = if struct_ret {
            IrType::Void
        } else {
            self.env.types.c_type_to_ir(return_type)?
        };

        let call_value = self.builder.build_call(callee.value, return_ir, arg_values)?;
        let value = local_for_ret_value.unwrap_or(call_value);

        Ok(Term {
            ctype: return_type,
            value,
        })
    }

    fn gen_va_start(&mut self, args: &[Expr], span: &SourceSpan) -> Result<Term, CompilerError> {
        if args.len() != 1 {
            return Err(CompilerError::semantic(
                "__builtin_va_start takes exactly one argument",
                span.clone(),
            ));
        }
        let va_list = self.gen_expr(&args[0], ExprContext::Rvalue)?;
        self.check_va_list_type(va_list.ctype, span)?;

        let value = self.builder.build_va_start(va_list.value)?;
        Ok(Term {
            ctype: self.env.types.void_type,
            value,
        })
    }

    /// `__builtin_va_arg(list, T)`: call the runtime helper, which yields
    /// the next argument as a 64-bit unsigned integer, then convert to the
    /// requested type
    pub(super) fn gen_va_arg(
        &mut self,
        list: &Expr,
        type_name: &TypeName,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let va_list = self.gen_expr(list, ExprContext::Rvalue)?;
        self.check_va_list_type(va_list.ctype, span)?;

        let arg_type = self.type_name_to_c_type(type_name, span)?;
        if !self.env.types.is_integer(arg_type) && !self.env.types.is_pointer(arg_type) {
            return Err(CompilerError::unimplemented(
                "va_arg of a non-scalar type",
                span.clone(),
            ));
        }

        let helper = self.builder.builtin_va_arg();
        let unsigned_long = self.env.types.unsigned_long_type;
        let unsigned_long_ir = self.env.types.c_type_to_ir(unsigned_long)?;
        let raw = self
            .builder
            .build_call(helper, unsigned_long_ir, vec![va_list.value])?;

        self.convert_type(
            Term {
                ctype: unsigned_long,
                value: raw,
            },
            arg_type,
        )
    }

    /// A va_list argument arrives as an array of (or pointer to) the
    /// va_list record type
    fn check_va_list_type(&self, ty: TypeRef, span: &SourceSpan) -> Result<(), CompilerError> {
        let elem = match self.env.types.get(ty) {
            CType::Array { elem, .. } => *elem,
            CType::Pointer { pointee } => *pointee,
            _ => {
                return Err(CompilerError::semantic(
                    "expected a va_list value",
                    span.clone(),
                ))
            }
        };
        if !matches!(self.env.types.get(elem), CType::Struct { .. }) {
            return Err(CompilerError::semantic(
                "expected a va_list value",
                span.clone(),
            ));
        }
        Ok(())
    }
}
