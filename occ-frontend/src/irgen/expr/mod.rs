//! Expression lowering
//!
//! `gen_expr` produces a `Term` for an expression under a context: l-value
//! (yield a pointer to storage), r-value (yield the value; aggregates and
//! functions stay as pointers), or const (fold everything; no emission).

mod arith;
mod assign;
mod calls;
mod misc;

use super::env::{ExprContext, Term};
use super::IrGen;
use crate::ast::{BinaryOp, Expr, ExprKind, IntSuffix, UnaryOp};
use crate::ir::{IrCmp, IrUnaryOp, Value};
use crate::types::{CType, IntRank, TypeRef};
use occ_common::{CompilerError, SourceSpan};

impl IrGen<'_> {
    pub fn gen_expr(&mut self, expr: &Expr, context: ExprContext) -> Result<Term, CompilerError> {
        if context == ExprContext::Lvalue {
            match &expr.kind {
                ExprKind::Identifier(_)
                | ExprKind::DotField { .. }
                | ExprKind::ArrowField { .. }
                | ExprKind::Index { .. }
                | ExprKind::Unary {
                    op: UnaryOp::Dereference,
                    ..
                } => {}
                _ => {
                    return Err(CompilerError::semantic(
                        "expression is not an lvalue",
                        expr.span.clone(),
                    ))
                }
            }
        }

        if context == ExprContext::Const {
            match &expr.kind {
                ExprKind::Assign { .. }
                | ExprKind::Call { .. }
                | ExprKind::Comma { .. }
                | ExprKind::Unary {
                    op:
                        UnaryOp::PreIncrement
                        | UnaryOp::PostIncrement
                        | UnaryOp::PreDecrement
                        | UnaryOp::PostDecrement,
                    ..
                } => {
                    return Err(CompilerError::semantic(
                        "operator not permitted in constant expression",
                        expr.span.clone(),
                    ))
                }
                _ => {}
            }
        }

        match &expr.kind {
            ExprKind::Identifier(name) => self.gen_identifier(name, context, &expr.span),
            ExprKind::IntLiteral { value, suffix } => {
                let ctype = self.type_of_int_literal(*suffix);
                let ir = self.env.types.c_type_to_ir(ctype)?;
                Ok(Term {
                    ctype,
                    value: Value::const_int(ir, *value),
                })
            }
            ExprKind::StringLiteral(bytes) => self.gen_string_literal(bytes),

            ExprKind::Unary { op, operand } => self.gen_unary(*op, operand, context, &expr.span),

            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                    self.gen_logical(*op == BinaryOp::LogicalOr, lhs, rhs, &expr.span)
                }
                BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEqual
                | BinaryOp::GreaterEqual => {
                    let left = self.gen_expr(lhs, ExprContext::Rvalue)?;
                    let right = self.gen_expr(rhs, ExprContext::Rvalue)?;
                    self.gen_cmp(left, right, comparison_op(*op), &expr.span)
                }
                _ => {
                    let left = self.gen_expr(lhs, ExprContext::Rvalue)?;
                    let right = self.gen_expr(rhs, ExprContext::Rvalue)?;
                    self.gen_binary_operator(left, right, *op, &expr.span)
                }
            },

            ExprKind::Assign { op, lhs, rhs } => {
                let left = self.gen_expr(lhs, ExprContext::Lvalue)?;
                let right = self.gen_expr(rhs, ExprContext::Rvalue)?;
                let (result, _) = self.gen_assign_op(left, right, *op, &expr.span)?;
                Ok(result)
            }

            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => self.gen_conditional(condition, then_expr, else_expr, &expr.span),

            ExprKind::Index { base, index } => {
                let base_term = self.gen_expr(base, ExprContext::Rvalue)?;
                let index_term = self.gen_expr(index, ExprContext::Rvalue)?;
                let pointer = self.gen_add(base_term, index_term, &expr.span)?;
                if !self.env.types.is_pointer(pointer.ctype) {
                    return Err(CompilerError::semantic(
                        "indexed expression is not a pointer or array",
                        expr.span.clone(),
                    ));
                }
                self.gen_deref(pointer, context, &expr.span)
            }

            ExprKind::DotField { base, field } => {
                let struct_term = self.gen_expr(base, ExprContext::Rvalue)?;
                if !matches!(self.env.types.get(struct_term.ctype), CType::Struct { .. }) {
                    return Err(CompilerError::semantic(
                        "field access on a non-struct value",
                        expr.span.clone(),
                    ));
                }
                self.gen_struct_field(struct_term, field, context, &expr.span)
            }

            ExprKind::ArrowField { base, field } => {
                let pointer_term = self.gen_expr(base, ExprContext::Rvalue)?;
                let pointee = self.env.types.pointee(pointer_term.ctype);
                match pointee {
                    Some(p) if matches!(self.env.types.get(p), CType::Struct { .. }) => {}
                    _ => {
                        return Err(CompilerError::semantic(
                            "'->' applied to a non-pointer-to-struct value",
                            expr.span.clone(),
                        ))
                    }
                }
                self.gen_struct_field(pointer_term, field, context, &expr.span)
            }

            ExprKind::Call { callee, args } => self.gen_call(callee, args, &expr.span),

            ExprKind::Cast { type_name, operand } => {
                let target = self.type_name_to_c_type(type_name, &expr.span)?;
                let castee = self.gen_expr(operand, ExprContext::Rvalue)?;
                self.convert_type(castee, target)
            }

            ExprKind::SizeofExpr(operand) => self.gen_sizeof_expr(operand),
            ExprKind::SizeofType(type_name) => {
                let ty = self.type_name_to_c_type(type_name, &expr.span)?;
                self.gen_sizeof_value(ty, &expr.span)
            }

            ExprKind::CompoundLiteral {
                type_name,
                elements,
            } => self.gen_compound_literal(type_name, elements, &expr.span),

            ExprKind::BuiltinVaArg { list, type_name } => {
                self.gen_va_arg(list, type_name, &expr.span)
            }

            ExprKind::Comma { lhs, rhs } => {
                self.gen_expr(lhs, ExprContext::Rvalue)?;
                self.gen_expr(rhs, ExprContext::Rvalue)
            }
        }
    }

    fn gen_identifier(
        &mut self,
        name: &str,
        context: ExprContext,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let binding = self.env.lookup(name).ok_or_else(|| {
            CompilerError::semantic(format!("unknown identifier '{}'", name), span.clone())
        })?;
        let constant = binding.constant;
        let term = binding.term;

        // Functions, arrays, and structs implicitly have their address taken
        let addressed = matches!(
            self.env.types.get(term.ctype),
            CType::Function { .. } | CType::Array { .. } | CType::Struct { .. }
        );

        let value = if context == ExprContext::Lvalue || addressed {
            if constant {
                return Err(CompilerError::semantic(
                    format!("'{}' is not addressable", name),
                    span.clone(),
                ));
            }
            term.value
        } else if constant {
            term.value
        } else {
            if context == ExprContext::Const {
                return Err(CompilerError::semantic(
                    "expression is not constant",
                    span.clone(),
                ));
            }
            let ir = self.env.types.c_type_to_ir(term.ctype)?;
            self.builder.build_load(term.value, ir)?
        };

        Ok(Term {
            ctype: term.ctype,
            value,
        })
    }

    fn gen_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        context: ExprContext,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        match op {
            UnaryOp::AddressOf => {
                let mut ptr = self.gen_expr(operand, ExprContext::Lvalue)?;
                ptr.ctype = self.env.types.pointer_to(ptr.ctype);
                Ok(ptr)
            }
            UnaryOp::Dereference => {
                let pointer = self.gen_expr(operand, ExprContext::Rvalue)?;
                self.gen_deref(pointer, context, span)
            }
            UnaryOp::LogicalNot => {
                let inner = self.gen_expr(operand, ExprContext::Rvalue)?;
                let int_type = self.env.types.int_type;
                let int_ir = self.env.types.c_type_to_ir(int_type)?;
                let zero = Term {
                    ctype: int_type,
                    value: Value::const_int(int_ir, 0),
                };
                self.gen_cmp(inner, zero, IrCmp::Eq, span)
            }
            UnaryOp::Minus => {
                let term = self.gen_expr(operand, ExprContext::Rvalue)?;
                let value = self.builder.build_unary(IrUnaryOp::Neg, term.value)?;
                Ok(Term {
                    ctype: term.ctype,
                    value,
                })
            }
            UnaryOp::BitNot => {
                let term = self.gen_expr(operand, ExprContext::Rvalue)?;
                let value = self.builder.build_unary(IrUnaryOp::BitNot, term.value)?;
                Ok(Term {
                    ctype: term.ctype,
                    value,
                })
            }
            UnaryOp::PreIncrement
            | UnaryOp::PostIncrement
            | UnaryOp::PreDecrement
            | UnaryOp::PostDecrement => self.gen_inc_dec(op, operand, span),
        }
    }

    /// Dereference a (possibly decayed) pointer term
    pub(super) fn gen_deref(
        &mut self,
        pointer: Term,
        context: ExprContext,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let pointer_type = self.env.types.decay(pointer.ctype);
        let pointee = self.env.types.pointee(pointer_type).ok_or_else(|| {
            CompilerError::semantic("dereference of a non-pointer value", span.clone())
        })?;

        // Structs, arrays, and functions implicitly keep their address
        let addressed = matches!(
            self.env.types.get(pointee),
            CType::Struct { .. } | CType::Array { .. } | CType::Function { .. }
        );

        let value = if context == ExprContext::Lvalue || addressed {
            pointer.value
        } else {
            let ir = self.env.types.c_type_to_ir(pointee)?;
            self.builder.build_load(pointer.value, ir)?
        };

        Ok(Term {
            ctype: pointee,
            value,
        })
    }

    /// Address (and in r-value context, value) of a named struct/union field
    pub(super) fn gen_struct_field(
        &mut self,
        struct_term: Term,
        field_name: &str,
        context: ExprContext,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        let mut ctype = struct_term.ctype;
        if let Some(pointee) = self.env.types.pointee(ctype) {
            ctype = pointee;
        }

        let (field_ty, field_index, ir) = match self.env.types.get(ctype) {
            CType::Struct {
                fields,
                incomplete: false,
                ir: Some(ir),
                ..
            } => {
                let (index, field) = fields
                    .iter()
                    .enumerate()
                    .find(|(_, f)| f.name == field_name)
                    .ok_or_else(|| {
                        CompilerError::semantic(
                            format!("no field named '{}'", field_name),
                            span.clone(),
                        )
                    })?;
                (field.ty, index as u64, *ir)
            }
            _ => {
                return Err(CompilerError::semantic(
                    "field access on an incomplete type",
                    span.clone(),
                ))
            }
        };

        let value = self.builder.build_field(
            struct_term.value,
            crate::ir::IrType::Aggregate(ir),
            field_index,
        )?;

        let load = context == ExprContext::Rvalue
            && !matches!(
                self.env.types.get(field_ty),
                CType::Struct { .. } | CType::Array { .. }
            );
        let value = if load {
            let field_ir = self.env.types.c_type_to_ir(field_ty)?;
            self.builder.build_load(value, field_ir)?
        } else {
            value
        };

        Ok(Term {
            ctype: field_ty,
            value,
        })
    }

    /// Map a literal suffix to its type.
    /// TODO: unsuffixed literals should pick the first type that can
    /// represent the value per C99 6.4.4.1; for now they are plain int.
    fn type_of_int_literal(&self, suffix: IntSuffix) -> TypeRef {
        let types = &self.env.types;
        match suffix {
            IntSuffix::None => types.int_type,
            IntSuffix::Unsigned => types.integer(IntRank::Int, false),
            IntSuffix::Long => types.integer(IntRank::Long, true),
            IntSuffix::UnsignedLong => types.integer(IntRank::Long, false),
            IntSuffix::LongLong => types.integer(IntRank::LongLong, true),
            IntSuffix::UnsignedLongLong => types.integer(IntRank::LongLong, false),
        }
    }
}

fn comparison_op(op: BinaryOp) -> IrCmp {
    // Signed forms here; gen_cmp switches to unsigned forms when the
    // converted operand type is unsigned
    match op {
        BinaryOp::Equal => IrCmp::Eq,
        BinaryOp::NotEqual => IrCmp::Neq,
        BinaryOp::Less => IrCmp::Slt,
        BinaryOp::Greater => IrCmp::Sgt,
        BinaryOp::LessEqual => IrCmp::Slte,
        BinaryOp::GreaterEqual => IrCmp::Sgte,
        _ => unreachable!("not a comparison operator"),
    }
}
