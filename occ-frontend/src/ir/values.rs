//! IR value representations

use super::types::IrType;
use occ_common::{GlobalId, LocalId, TempId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An operand: what it is, and the IR type it carries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: IrType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Immediate integer (bit pattern, masked to the type's width)
    Const(u64),
    /// Incoming function argument by position
    Arg(u32),
    /// Address of a stack slot
    Local(LocalId),
    /// Instruction result
    Temp(TempId),
    /// Address of a global
    Global(GlobalId),
}

impl Value {
    pub fn const_int(ty: IrType, value: u64) -> Self {
        Self {
            kind: ValueKind::Const(value),
            ty,
        }
    }

    pub fn arg(index: u32, ty: IrType) -> Self {
        Self {
            kind: ValueKind::Arg(index),
            ty,
        }
    }

    pub fn local(id: LocalId) -> Self {
        Self {
            kind: ValueKind::Local(id),
            ty: IrType::Ptr,
        }
    }

    pub fn temp(id: TempId, ty: IrType) -> Self {
        Self {
            kind: ValueKind::Temp(id),
            ty,
        }
    }

    pub fn global(id: GlobalId) -> Self {
        Self {
            kind: ValueKind::Global(id),
            ty: IrType::Ptr,
        }
    }

    pub fn as_const(&self) -> Option<u64> {
        match self.kind {
            ValueKind::Const(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<occ_common::GlobalId> {
        match self.kind {
            ValueKind::Global(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Const(v) => write!(f, "{} {}", self.ty, v),
            ValueKind::Arg(i) => write!(f, "{} arg{}", self.ty, i),
            ValueKind::Local(id) => write!(f, "ptr %local.{}", id),
            ValueKind::Temp(id) => write!(f, "{} %{}", self.ty, id),
            ValueKind::Global(id) => write!(f, "ptr @{}", id),
        }
    }
}
