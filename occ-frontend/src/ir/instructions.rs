//! IR instructions

use super::ops::{CastOp, IrBinaryOp, IrCmp, IrUnaryOp};
use super::types::IrType;
use super::values::Value;
use occ_common::{BlockId, TempId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable reference to an instruction within a function, used to patch
/// goto branches after their target labels are known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrRef {
    pub block: BlockId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /// result = op lhs, rhs
    Binary {
        result: TempId,
        op: IrBinaryOp,
        lhs: Value,
        rhs: Value,
        ty: IrType,
    },

    /// result = op operand
    Unary {
        result: TempId,
        op: IrUnaryOp,
        operand: Value,
        ty: IrType,
    },

    /// result = convert operand to ty
    Cast {
        result: TempId,
        op: CastOp,
        operand: Value,
        ty: IrType,
    },

    /// result = cmp lhs, rhs (boolean integer)
    Cmp {
        result: TempId,
        cmp: IrCmp,
        lhs: Value,
        rhs: Value,
    },

    /// result = load ty from ptr
    Load {
        result: TempId,
        ptr: Value,
        ty: IrType,
    },

    /// store value through ptr
    Store { ptr: Value, value: Value },

    /// result = address of field/element `index` of the aggregate at `base`
    Field {
        result: TempId,
        base: Value,
        aggr: IrType,
        index: u64,
    },

    /// result = call callee(args...)
    Call {
        result: TempId,
        callee: Value,
        ret: IrType,
        args: Vec<Value>,
    },

    /// SSA merge; one incoming value per predecessor. Slots are filled by
    /// `phi_set_param` after the phi is created.
    Phi {
        result: TempId,
        ty: IrType,
        incoming: Vec<Option<(BlockId, Value)>>,
    },

    /// Unconditional branch. A `None` target is a pending goto, patched by
    /// the fixup pass before the function is finished.
    Branch { target: Option<BlockId> },

    /// Conditional branch on a boolean integer
    Cond {
        cond: Value,
        then_target: BlockId,
        else_target: BlockId,
    },

    Ret { value: Value },
    RetVoid,

    /// Initialize a va_list from the current function's variadic state
    VaStart { list: Value },
}

impl Instr {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Branch { .. } | Instr::Cond { .. } | Instr::Ret { .. } | Instr::RetVoid
        )
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Binary {
                result,
                op,
                lhs,
                rhs,
                ty,
            } => write!(f, "%{} = {} {} {}, {}", result, op, ty, lhs, rhs),
            Instr::Unary {
                result,
                op,
                operand,
                ty,
            } => write!(f, "%{} = {} {} {}", result, op, ty, operand),
            Instr::Cast {
                result,
                op,
                operand,
                ty,
            } => write!(f, "%{} = {} {} to {}", result, op, operand, ty),
            Instr::Cmp {
                result,
                cmp,
                lhs,
                rhs,
            } => write!(f, "%{} = cmp {} {}, {}", result, cmp, lhs, rhs),
            Instr::Load { result, ptr, ty } => write!(f, "%{} = load {}, {}", result, ty, ptr),
            Instr::Store { ptr, value } => write!(f, "store {}, {}", value, ptr),
            Instr::Field {
                result,
                base,
                aggr,
                index,
            } => write!(f, "%{} = field {} {}, {}", result, aggr, base, index),
            Instr::Call {
                result,
                callee,
                ret,
                args,
            } => {
                write!(f, "%{} = call {} {}(", result, ret, callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Instr::Phi {
                result,
                ty,
                incoming,
            } => {
                write!(f, "%{} = phi {} ", result, ty)?;
                for (i, param) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match param {
                        Some((block, value)) => write!(f, "[{}, b{}]", value, block)?,
                        None => write!(f, "[unset]")?,
                    }
                }
                Ok(())
            }
            Instr::Branch {
                target: Some(target),
            } => write!(f, "branch b{}", target),
            Instr::Branch { target: None } => write!(f, "branch <pending>"),
            Instr::Cond {
                cond,
                then_target,
                else_target,
            } => write!(f, "cond {}, b{}, b{}", cond, then_target, else_target),
            Instr::Ret { value } => write!(f, "ret {}", value),
            Instr::RetVoid => write!(f, "ret void"),
            Instr::VaStart { list } => write!(f, "va_start {}", list),
        }
    }
}
