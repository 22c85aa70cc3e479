//! Implicit conversions
//!
//! `convert_type` inserts the conversion instructions needed to move a term
//! to a target C type; the usual arithmetic conversions bring two integer
//! operands to their common type. When the two operands arrive from
//! different predecessor blocks (ternary, short-circuit), conversions are
//! emitted in each predecessor so values reaching the join already share a
//! type.

use super::env::Term;
use super::IrGen;
use crate::ir::{CastOp, IrType};
use crate::types::{CType, TypeRef};
use occ_common::{BlockId, CompilerError, SourceSpan};

impl IrGen<'_> {
    pub fn convert_type(&mut self, term: Term, target: TypeRef) -> Result<Term, CompilerError> {
        if self.env.types.type_eq(term.ctype, target) {
            return Ok(term);
        }

        let source_kind = self.env.types.get(term.ctype).clone();
        let target_kind = self.env.types.get(target).clone();

        let converted = match (&source_kind, &target_kind) {
            (CType::Integer { signed, .. }, CType::Integer { .. }) => {
                let target_ir = self.env.types.c_type_to_ir(target)?;
                let source_ir = self.env.types.c_type_to_ir(term.ctype)?;
                let source_bits = source_ir.int_bits().unwrap_or(64);
                let target_bits = target_ir.int_bits().unwrap_or(64);
                if source_bits > target_bits {
                    self.builder.build_cast(CastOp::Trunc, term.value, target_ir)?
                } else if *signed {
                    self.builder.build_cast(CastOp::Sext, term.value, target_ir)?
                } else {
                    self.builder.build_cast(CastOp::Zext, term.value, target_ir)?
                }
            }
            (CType::Integer { .. }, CType::Pointer { .. }) => {
                // Widen to the pointer width first, then retype
                let source_ir = self.env.types.c_type_to_ir(term.ctype)?;
                let bits = source_ir.int_bits().unwrap_or(64);
                let mut value = term.value;
                if bits < 64 {
                    value = self
                        .builder
                        .build_cast(CastOp::Zext, value, IrType::Int { bits: 64 })?;
                }
                self.builder.build_cast(CastOp::Cast, value, IrType::Ptr)?
            }
            (CType::Pointer { .. }, CType::Integer { .. }) => {
                let target_ir = self.env.types.c_type_to_ir(target)?;
                self.builder.build_cast(CastOp::Cast, term.value, target_ir)?
            }
            // Pointer-to-pointer conversion is a no-op of type
            (CType::Pointer { .. }, CType::Pointer { .. }) => term.value,
            // Array values already travel as a pointer to the first element
            (CType::Array { .. }, CType::Pointer { .. }) => term.value,
            // Implicit conversion from function to pointer-to-function
            (CType::Function { .. }, CType::Pointer { pointee })
                if self.env.types.type_eq(*pointee, term.ctype) =>
            {
                term.value
            }
            // Converting to void produces a discardable value
            (_, CType::Void) => term.value,
            _ => {
                return Err(CompilerError::unimplemented(
                    "conversion between these types",
                    SourceSpan::dummy(),
                ))
            }
        };

        Ok(Term {
            ctype: target,
            value: converted,
        })
    }

    /// The usual arithmetic conversions, with both operands in the current
    /// block
    pub fn arithmetic_conversions(
        &mut self,
        left: &mut Term,
        right: &mut Term,
    ) -> Result<(), CompilerError> {
        let block = self.builder.current_block;
        self.arithmetic_conversions_with_blocks(left, block, right, block)
    }

    /// The usual arithmetic conversions, emitting each conversion in the
    /// block its operand arrives from
    pub fn arithmetic_conversions_with_blocks(
        &mut self,
        left: &mut Term,
        left_block: BlockId,
        right: &mut Term,
        right_block: BlockId,
    ) -> Result<(), CompilerError> {
        if !self.env.types.is_integer(left.ctype) || !self.env.types.is_integer(right.ctype) {
            return Err(CompilerError::internal(
                "arithmetic conversions on non-integer operands",
            ));
        }

        let original_block = self.builder.current_block;

        let left_rank = self.env.types.rank(left.ctype).expect("checked integer above");
        let right_rank = self.env.types.rank(right.ctype).expect("checked integer above");
        let left_signed = self.env.types.is_signed(left.ctype);
        let right_signed = self.env.types.is_signed(right.ctype);

        if left_signed == right_signed {
            if left_rank != right_rank {
                let (to_convert, conversion_type, conversion_block) = if left_rank < right_rank {
                    (&mut *left, right.ctype, left_block)
                } else {
                    (&mut *right, left.ctype, right_block)
                };
                self.builder.set_current_block(conversion_block);
                *to_convert = self.convert_type(*to_convert, conversion_type)?;
            }
        } else {
            let (signed_term, signed_block, unsigned_term, unsigned_block) = if left_signed {
                (&mut *left, left_block, &mut *right, right_block)
            } else {
                (&mut *right, right_block, &mut *left, left_block)
            };
            let signed_rank = if left_signed { left_rank } else { right_rank };
            let unsigned_rank = if left_signed { right_rank } else { left_rank };

            if unsigned_rank >= signed_rank {
                let target = unsigned_term.ctype;
                self.builder.set_current_block(signed_block);
                *signed_term = self.convert_type(*signed_term, target)?;
            } else {
                let target = signed_term.ctype;
                self.builder.set_current_block(unsigned_block);
                *unsigned_term = self.convert_type(*unsigned_term, target)?;
            }
        }

        self.builder.set_current_block(original_block);
        Ok(())
    }
}
