//! IR builder
//!
//! Owns the translation unit under construction plus the current function
//! and block cursors. Instruction builders constant-fold when every operand
//! is an immediate; the constant-expression evaluator relies on this to
//! lower compile-time expressions without touching any block.

use super::function::IrFunction;
use super::instructions::{Instr, InstrRef};
use super::module::{FunctionSig, TransUnit};
use super::ops::{CastOp, IrBinaryOp, IrCmp, IrUnaryOp};
use super::types::IrType;
use super::values::Value;
use log::trace;
use occ_common::{BlockId, CompilerError, TempId};

/// Mask a bit pattern to an integer width
fn mask_to(value: u64, bits: u8) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Reinterpret a masked bit pattern as a signed value of the given width
fn sign_extend(value: u64, bits: u8) -> i64 {
    if bits >= 64 {
        value as i64
    } else {
        let shift = 64 - bits;
        ((value << shift) as i64) >> shift
    }
}

pub struct IrBuilder {
    pub trans_unit: TransUnit,
    pub current_function: Option<IrFunction>,
    pub current_block: BlockId,
}

impl IrBuilder {
    pub fn new(unit_name: &str) -> Self {
        Self {
            trans_unit: TransUnit::new(unit_name),
            current_function: None,
            current_block: 0,
        }
    }

    fn func(&self) -> Result<&IrFunction, CompilerError> {
        self.current_function
            .as_ref()
            .ok_or_else(|| CompilerError::internal("no function under construction"))
    }

    fn func_mut(&mut self) -> Result<&mut IrFunction, CompilerError> {
        self.current_function
            .as_mut()
            .ok_or_else(|| CompilerError::internal("no function under construction"))
    }

    /// Begin lowering a new function body; the cursor moves to its entry
    pub fn start_function(&mut self) {
        let function = IrFunction::new();
        self.current_block = function.entry();
        self.current_function = Some(function);
    }

    /// Take the finished body out of the builder
    pub fn finish_function(&mut self) -> Result<IrFunction, CompilerError> {
        self.current_function
            .take()
            .ok_or_else(|| CompilerError::internal("no function under construction"))
    }

    pub fn add_block(&mut self, name: &str) -> Result<BlockId, CompilerError> {
        Ok(self.func_mut()?.add_block(name))
    }

    pub fn reserve_block(&mut self, name: &str) -> Result<BlockId, CompilerError> {
        Ok(self.func_mut()?.reserve_block(name))
    }

    pub fn append_block(&mut self, id: BlockId) -> Result<(), CompilerError> {
        self.func_mut()?.append_block(id);
        Ok(())
    }

    pub fn insert_block_in_layout(
        &mut self,
        position: usize,
        id: BlockId,
    ) -> Result<(), CompilerError> {
        self.func_mut()?.insert_block(position, id);
        Ok(())
    }

    /// Current length of the function's block layout
    pub fn layout_len(&self) -> Result<usize, CompilerError> {
        Ok(self.func()?.layout.len())
    }

    pub fn set_current_block(&mut self, id: BlockId) {
        self.current_block = id;
    }

    pub fn current_block_has_terminator(&self) -> bool {
        match self.func() {
            Ok(f) => f.block(self.current_block).has_terminator(),
            Err(_) => false,
        }
    }

    /// Number of blocks in the current function (0 outside a function);
    /// used by the constant evaluator's no-emission check
    pub fn block_count(&self) -> usize {
        self.current_function
            .as_ref()
            .map_or(0, |f| f.blocks.len())
    }

    /// Number of instructions in the current block (0 outside a function)
    pub fn instr_count(&self) -> usize {
        self.current_function
            .as_ref()
            .map_or(0, |f| f.block(self.current_block).instrs.len())
    }

    fn new_temp(&mut self) -> Result<TempId, CompilerError> {
        Ok(self.func_mut()?.new_temp())
    }

    /// Append to the current block. Instructions after a terminator are
    /// unreachable and silently dropped, preserving the one-terminator
    /// invariant.
    fn add_instr(&mut self, instr: Instr) -> Result<(), CompilerError> {
        let block = self.current_block;
        let function = self.func_mut()?;
        if function.block(block).has_terminator() {
            trace!("dropping unreachable instruction: {}", instr);
            return Ok(());
        }
        function.block_mut(block).instrs.push(instr);
        Ok(())
    }

    pub fn build_local(&mut self, ty: IrType) -> Result<Value, CompilerError> {
        Ok(Value::local(self.func_mut()?.new_local(ty)))
    }

    pub fn build_load(&mut self, ptr: Value, ty: IrType) -> Result<Value, CompilerError> {
        let result = self.new_temp()?;
        self.add_instr(Instr::Load { result, ptr, ty })?;
        Ok(Value::temp(result, ty))
    }

    pub fn build_store(&mut self, ptr: Value, value: Value) -> Result<(), CompilerError> {
        self.add_instr(Instr::Store { ptr, value })
    }

    pub fn build_binary(
        &mut self,
        op: IrBinaryOp,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, CompilerError> {
        let ty = lhs.ty;
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            if let Some(folded) = fold_binary(op, a, b, ty) {
                return Ok(Value::const_int(ty, folded));
            }
        }
        let result = self.new_temp()?;
        self.add_instr(Instr::Binary {
            result,
            op,
            lhs,
            rhs,
            ty,
        })?;
        Ok(Value::temp(result, ty))
    }

    pub fn build_unary(&mut self, op: IrUnaryOp, operand: Value) -> Result<Value, CompilerError> {
        let ty = operand.ty;
        if let Some(v) = operand.as_const() {
            let bits = ty.int_bits().unwrap_or(64);
            let folded = match op {
                IrUnaryOp::Neg => mask_to(v.wrapping_neg(), bits),
                IrUnaryOp::BitNot => mask_to(!v, bits),
            };
            return Ok(Value::const_int(ty, folded));
        }
        let result = self.new_temp()?;
        self.add_instr(Instr::Unary {
            result,
            op,
            operand,
            ty,
        })?;
        Ok(Value::temp(result, ty))
    }

    pub fn build_cast(
        &mut self,
        op: CastOp,
        operand: Value,
        ty: IrType,
    ) -> Result<Value, CompilerError> {
        if let Some(v) = operand.as_const() {
            let src_bits = operand.ty.int_bits().unwrap_or(64);
            let dst_bits = ty.int_bits().unwrap_or(64);
            let folded = match op {
                CastOp::Trunc => mask_to(v, dst_bits),
                CastOp::Zext | CastOp::Cast => v,
                CastOp::Sext => mask_to(sign_extend(v, src_bits) as u64, dst_bits),
            };
            return Ok(Value::const_int(ty, folded));
        }
        let result = self.new_temp()?;
        self.add_instr(Instr::Cast {
            result,
            op,
            operand,
            ty,
        })?;
        Ok(Value::temp(result, ty))
    }

    /// Comparisons produce a boolean in the canonical int width
    pub fn build_cmp(&mut self, cmp: IrCmp, lhs: Value, rhs: Value) -> Result<Value, CompilerError> {
        let result_ty = IrType::Int { bits: 32 };
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            let bits = lhs.ty.int_bits().unwrap_or(64);
            let sa = sign_extend(a, bits);
            let sb = sign_extend(b, bits);
            let ua = mask_to(a, bits);
            let ub = mask_to(b, bits);
            let holds = match cmp {
                IrCmp::Eq => ua == ub,
                IrCmp::Neq => ua != ub,
                IrCmp::Sgt => sa > sb,
                IrCmp::Sgte => sa >= sb,
                IrCmp::Slt => sa < sb,
                IrCmp::Slte => sa <= sb,
                IrCmp::Ugt => ua > ub,
                IrCmp::Ugte => ua >= ub,
                IrCmp::Ult => ua < ub,
                IrCmp::Ulte => ua <= ub,
            };
            return Ok(Value::const_int(result_ty, holds as u64));
        }
        let result = self.new_temp()?;
        self.add_instr(Instr::Cmp {
            result,
            cmp,
            lhs,
            rhs,
        })?;
        Ok(Value::temp(result, result_ty))
    }

    /// Address of field/element `index` within the aggregate at `base`
    pub fn build_field(
        &mut self,
        base: Value,
        aggr: IrType,
        index: u64,
    ) -> Result<Value, CompilerError> {
        let result = self.new_temp()?;
        self.add_instr(Instr::Field {
            result,
            base,
            aggr,
            index,
        })?;
        Ok(Value::temp(result, IrType::Ptr))
    }

    pub fn build_call(
        &mut self,
        callee: Value,
        ret: IrType,
        args: Vec<Value>,
    ) -> Result<Value, CompilerError> {
        let result = self.new_temp()?;
        self.add_instr(Instr::Call {
            result,
            callee,
            ret,
            args,
        })?;
        Ok(Value::temp(result, ret))
    }

    pub fn build_branch(&mut self, target: BlockId) -> Result<(), CompilerError> {
        self.add_instr(Instr::Branch {
            target: Some(target),
        })
    }

    /// Emit a branch with no target yet, for goto. Returns the patch point,
    /// or None when the branch was dropped as unreachable.
    pub fn build_open_branch(&mut self) -> Result<Option<InstrRef>, CompilerError> {
        if self.current_block_has_terminator() {
            return Ok(None);
        }
        self.add_instr(Instr::Branch { target: None })?;
        let block = self.current_block;
        let index = self.func()?.block(block).instrs.len() - 1;
        Ok(Some(InstrRef { block, index }))
    }

    pub fn build_cond(
        &mut self,
        cond: Value,
        then_target: BlockId,
        else_target: BlockId,
    ) -> Result<(), CompilerError> {
        self.add_instr(Instr::Cond {
            cond,
            then_target,
            else_target,
        })
    }

    pub fn build_ret(&mut self, value: Value) -> Result<(), CompilerError> {
        self.add_instr(Instr::Ret { value })
    }

    pub fn build_ret_void(&mut self) -> Result<(), CompilerError> {
        self.add_instr(Instr::RetVoid)
    }

    pub fn build_va_start(&mut self, list: Value) -> Result<Value, CompilerError> {
        self.add_instr(Instr::VaStart { list })?;
        Ok(Value::const_int(IrType::Void, 0))
    }

    /// Patch a pending goto branch with its resolved target
    pub fn patch_branch(&mut self, at: InstrRef, target: BlockId) -> Result<(), CompilerError> {
        match self
            .func_mut()?
            .block_mut(at.block)
            .instrs
            .get_mut(at.index)
        {
            Some(Instr::Branch { target: slot @ None }) => {
                *slot = Some(target);
                Ok(())
            }
            _ => Err(CompilerError::internal(
                "goto fixup does not point at a pending branch",
            )),
        }
    }

    /// A phi with `arity` unfilled incoming slots
    pub fn build_phi(&mut self, ty: IrType, arity: usize) -> Result<Value, CompilerError> {
        let result = self.new_temp()?;
        self.add_instr(Instr::Phi {
            result,
            ty,
            incoming: vec![None; arity],
        })?;
        Ok(Value::temp(result, ty))
    }

    /// Fill one incoming slot of a phi in the current block
    pub fn phi_set_param(
        &mut self,
        phi: Value,
        index: usize,
        block: BlockId,
        value: Value,
    ) -> Result<(), CompilerError> {
        let phi_id = match phi.kind {
            super::values::ValueKind::Temp(id) => id,
            _ => return Err(CompilerError::internal("phi_set_param on a non-phi value")),
        };
        let current = self.current_block;
        let function = self.func_mut()?;
        for instr in function.block_mut(current).instrs.iter_mut().rev() {
            if let Instr::Phi {
                result, incoming, ..
            } = instr
            {
                if *result == phi_id {
                    incoming[index] = Some((block, value));
                    return Ok(());
                }
            }
        }
        Err(CompilerError::internal(
            "phi_set_param: phi not found in current block",
        ))
    }

    /// The memcpy builtin, declared on first use
    pub fn builtin_memcpy(&mut self) -> Value {
        let sig = FunctionSig {
            ret: IrType::Ptr,
            params: vec![IrType::Ptr, IrType::Ptr, IrType::Int { bits: 64 }],
            variadic: false,
        };
        Value::global(self.trans_unit.add_function("memcpy", sig))
    }

    /// The memset builtin, declared on first use
    pub fn builtin_memset(&mut self) -> Value {
        let sig = FunctionSig {
            ret: IrType::Ptr,
            params: vec![IrType::Ptr, IrType::Int { bits: 32 }, IrType::Int { bits: 64 }],
            variadic: false,
        };
        Value::global(self.trans_unit.add_function("memset", sig))
    }

    /// The variadic-argument runtime helper, declared on first use. Its
    /// exact calling convention is the backend's concern.
    pub fn builtin_va_arg(&mut self) -> Value {
        let sig = FunctionSig {
            ret: IrType::Int { bits: 64 },
            params: vec![IrType::Ptr],
            variadic: false,
        };
        Value::global(self.trans_unit.add_function("__builtin_va_arg_uint64", sig))
    }
}

fn fold_binary(op: IrBinaryOp, a: u64, b: u64, ty: IrType) -> Option<u64> {
    let bits = ty.int_bits().unwrap_or(64);
    let value = match op {
        IrBinaryOp::Add => a.wrapping_add(b),
        IrBinaryOp::Sub => a.wrapping_sub(b),
        IrBinaryOp::Mul => a.wrapping_mul(b),
        IrBinaryOp::Div => {
            if b == 0 {
                return None;
            }
            sign_extend(a, bits).wrapping_div(sign_extend(b, bits)) as u64
        }
        IrBinaryOp::Mod => {
            if b == 0 {
                return None;
            }
            sign_extend(a, bits).wrapping_rem(sign_extend(b, bits)) as u64
        }
        IrBinaryOp::BitAnd => a & b,
        IrBinaryOp::BitOr => a | b,
        IrBinaryOp::BitXor => a ^ b,
        IrBinaryOp::Shl => a.wrapping_shl(b as u32 & 63),
        IrBinaryOp::Shr => mask_to(a, bits).wrapping_shr(b as u32 & 63),
    };
    Some(mask_to(value, bits))
}
