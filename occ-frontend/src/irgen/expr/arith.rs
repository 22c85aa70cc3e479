//! Binary arithmetic, pointer arithmetic, and comparisons

use super::super::env::Term;
use super::super::IrGen;
use crate::ast::BinaryOp;
use crate::ir::{CastOp, IrBinaryOp, IrCmp, IrType, Value, ValueKind};
use occ_common::{CompilerError, SourceSpan};

fn arithmetic_ir_op(op: BinaryOp) -> IrBinaryOp {
    match op {
        BinaryOp::Add => IrBinaryOp::Add,
        BinaryOp::Sub => IrBinaryOp::Sub,
        BinaryOp::Mul => IrBinaryOp::Mul,
        BinaryOp::Div => IrBinaryOp::Div,
        BinaryOp::Mod => IrBinaryOp::Mod,
        BinaryOp::BitAnd => IrBinaryOp::BitAnd,
        BinaryOp::BitOr => IrBinaryOp::BitOr,
        BinaryOp::BitXor => IrBinaryOp::BitXor,
        BinaryOp::LeftShift => IrBinaryOp::Shl,
        // TODO: arithmetic right shift for signed left operands
        BinaryOp::RightShift => IrBinaryOp::Shr,
        _ => unreachable!("not an arithmetic operator"),
    }
}

impl IrGen<'_> {
    /// Lower a binary arithmetic operator, dispatching `+`/`-` through the
    /// pointer-aware paths
    pub(super) fn gen_binary_operator(
        &mut self,
        left: Term,
        right: Term,
        op: BinaryOp,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        if op == BinaryOp::Add {
            return self.gen_add(left, right, span);
        }
        if op == BinaryOp::Sub {
            return self.gen_sub(left, right, span);
        }

        let mut left = left;
        let mut right = right;
        left.ctype = self.env.types.decay(left.ctype);
        right.ctype = self.env.types.decay(right.ctype);
        self.arithmetic_conversions(&mut left, &mut right)?;

        let value = self
            .builder
            .build_binary(arithmetic_ir_op(op), left.value, right.value)?;
        Ok(Term {
            ctype: left.ctype,
            value,
        })
    }

    pub(super) fn gen_add(
        &mut self,
        mut left: Term,
        mut right: Term,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        left.ctype = self.env.types.decay(left.ctype);
        right.ctype = self.env.types.decay(right.ctype);

        let left_is_pointer = self.env.types.is_pointer(left.ctype);
        let right_is_pointer = self.env.types.is_pointer(right.ctype);

        if self.env.types.is_integer(left.ctype) && self.env.types.is_integer(right.ctype) {
            self.arithmetic_conversions(&mut left, &mut right)?;
            let value = self
                .builder
                .build_binary(IrBinaryOp::Add, left.value, right.value)?;
            Ok(Term {
                ctype: left.ctype,
                value,
            })
        } else if left_is_pointer ^ right_is_pointer {
            let (pointer, other) = if left_is_pointer {
                (left, right)
            } else {
                (right, left)
            };
            if !self.env.types.is_integer(other.ctype) {
                return Err(CompilerError::semantic(
                    "pointer addition requires an integer operand",
                    span.clone(),
                ));
            }
            self.gen_pointer_offset(pointer, other, IrBinaryOp::Add)
        } else {
            Err(CompilerError::unimplemented(
                "addition between these operand types",
                span.clone(),
            ))
        }
    }

    pub(super) fn gen_sub(
        &mut self,
        mut left: Term,
        mut right: Term,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        left.ctype = self.env.types.decay(left.ctype);
        right.ctype = self.env.types.decay(right.ctype);

        let left_is_pointer = self.env.types.is_pointer(left.ctype);
        let right_is_pointer = self.env.types.is_pointer(right.ctype);

        if self.env.types.is_integer(left.ctype) && self.env.types.is_integer(right.ctype) {
            self.arithmetic_conversions(&mut left, &mut right)?;
            let value = self
                .builder
                .build_binary(IrBinaryOp::Sub, left.value, right.value)?;
            Ok(Term {
                ctype: left.ctype,
                value,
            })
        } else if left_is_pointer && right_is_pointer {
            // Subtract as pointer-sized integers, then divide by the
            // pointee size. TODO: the result type should be ptrdiff_t.
            let pointee = self.env.types.pointee(left.ctype).unwrap();
            let pointee_size = self
                .env
                .types
                .size_of(&self.builder.trans_unit, pointee)?;
            let int_ptr_ir = IrType::Int { bits: 64 };
            let result_type = self.env.types.int_type;
            let result_ir = self.env.types.c_type_to_ir(result_type)?;

            let left_int = self.builder.build_cast(CastOp::Cast, left.value, int_ptr_ir)?;
            let right_int = self
                .builder
                .build_cast(CastOp::Cast, right.value, int_ptr_ir)?;
            let diff = self
                .builder
                .build_binary(IrBinaryOp::Sub, left_int, right_int)?;
            let cast = self.builder.build_cast(CastOp::Cast, diff, result_ir)?;
            let scaled = self.builder.build_binary(
                IrBinaryOp::Div,
                cast,
                Value::const_int(result_ir, pointee_size),
            )?;

            Ok(Term {
                ctype: result_type,
                value: scaled,
            })
        } else if left_is_pointer && self.env.types.is_integer(right.ctype) {
            self.gen_pointer_offset(left, right, IrBinaryOp::Sub)
        } else {
            Err(CompilerError::unimplemented(
                "subtraction between these operand types",
                span.clone(),
            ))
        }
    }

    /// Pointer +/- integer. A compile-time constant offset becomes an
    /// indexed `field` address; a runtime offset is scaled by the pointee
    /// size in a pointer-sized integer and cast back.
    fn gen_pointer_offset(
        &mut self,
        pointer: Term,
        other: Term,
        op: IrBinaryOp,
    ) -> Result<Term, CompilerError> {
        let result_type = pointer.ctype;
        let pointee = self.env.types.pointee(result_type).unwrap();

        if let ValueKind::Const(offset) = other.value.kind {
            if op == IrBinaryOp::Add {
                let array = self
                    .env
                    .types
                    .array_of(&mut self.builder.trans_unit, pointee)?;
                let array_ir = self.env.types.c_type_to_ir(array)?;
                let value = self.builder.build_field(pointer.value, array_ir, offset)?;
                return Ok(Term {
                    ctype: result_type,
                    value,
                });
            }
        }

        let pointee_size = self.env.types.size_of(&self.builder.trans_unit, pointee)?;
        let int_ptr_ir = IrType::Int { bits: 64 };

        let zext = self
            .builder
            .build_cast(CastOp::Zext, other.value, int_ptr_ir)?;
        let ptr_to_int = self
            .builder
            .build_cast(CastOp::Cast, pointer.value, int_ptr_ir)?;
        let addend = self.builder.build_binary(
            IrBinaryOp::Mul,
            zext,
            Value::const_int(int_ptr_ir, pointee_size),
        )?;
        let sum = self.builder.build_binary(op, ptr_to_int, addend)?;
        let value = self.builder.build_cast(CastOp::Cast, sum, IrType::Ptr)?;

        Ok(Term {
            ctype: result_type,
            value,
        })
    }

    /// Lower a comparison. Pointer comparisons accept the null-pointer
    /// constant on one side and fold tautological global comparisons;
    /// integer comparisons apply the usual conversions and pick signed or
    /// unsigned predicates by the converted type.
    pub(super) fn gen_cmp(
        &mut self,
        mut left: Term,
        mut right: Term,
        mut cmp: IrCmp,
        span: &SourceSpan,
    ) -> Result<Term, CompilerError> {
        left.ctype = self.env.types.decay(left.ctype);
        right.ctype = self.env.types.decay(right.ctype);

        let left_is_ptr = self.env.types.is_pointer(left.ctype);
        let right_is_ptr = self.env.types.is_pointer(right.ctype);
        let int_type = self.env.types.int_type;
        let int_ir = self.env.types.c_type_to_ir(int_type)?;

        if left_is_ptr || right_is_ptr {
            if !(left_is_ptr && right_is_ptr) {
                let (ptr_term, other_term) = if left_is_ptr {
                    (&left, &mut right)
                } else {
                    (&right, &mut left)
                };

                // "ptr <cmp> !ptr" is only valid when "!ptr" is a constant
                // zero: the null pointer constant
                if !self.env.types.is_integer(other_term.ctype)
                    || other_term.value.as_const() != Some(0)
                {
                    return Err(CompilerError::unimplemented(
                        "comparison between pointer and non-null integer",
                        span.clone(),
                    ));
                }

                // A global's address is never null
                if matches!(ptr_term.value.kind, ValueKind::Global(_)) {
                    return Ok(Term {
                        ctype: int_type,
                        value: Value::const_int(int_ir, (cmp == IrCmp::Neq) as u64),
                    });
                }

                let ptr_ctype = ptr_term.ctype;
                *other_term = self.convert_type(*other_term, ptr_ctype)?;
            } else if matches!(left.value.kind, ValueKind::Global(_))
                && matches!(right.value.kind, ValueKind::Global(_))
            {
                // Distinct globals have distinct addresses
                return Ok(Term {
                    ctype: int_type,
                    value: Value::const_int(int_ir, (cmp == IrCmp::Neq) as u64),
                });
            }
        } else {
            self.arithmetic_conversions(&mut left, &mut right)?;
            if !self.env.types.is_integer(left.ctype) {
                return Err(CompilerError::semantic(
                    "comparison between incompatible types",
                    span.clone(),
                ));
            }
            // Callers always pass the signed predicate; adjust for the
            // signedness of the converted operand type
            if !self.env.types.is_signed(left.ctype) {
                cmp = cmp.to_unsigned();
            }
        }

        let value = self.builder.build_cmp(cmp, left.value, right.value)?;
        Ok(Term {
            ctype: int_type,
            value,
        })
    }
}
