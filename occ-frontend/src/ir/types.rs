//! IR type system
//!
//! Scalar types are carried inline on values and instructions. Aggregate
//! layouts (structs and arrays) live in the translation unit's aggregate
//! table and are referenced by id, so the type graph can contain cycles.

use occ_common::AggrId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pointers are untyped addresses of this width
pub const POINTER_BITS: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    Void,
    /// Integer with bit width (8, 16, 32, or 64)
    Int { bits: u8 },
    /// Untyped pointer
    Ptr,
    /// Struct or array; layout in the aggregate table
    Aggregate(AggrId),
}

impl IrType {
    pub fn is_int(&self) -> bool {
        matches!(self, IrType::Int { .. })
    }

    pub fn int_bits(&self) -> Option<u8> {
        match self {
            IrType::Int { bits } => Some(*bits),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int { bits } => write!(f, "i{}", bits),
            IrType::Ptr => write!(f, "ptr"),
            IrType::Aggregate(id) => write!(f, "%aggr.{}", id),
        }
    }
}

/// A named aggregate layout record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateType {
    pub name: Option<String>,
    pub kind: AggregateKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggregateKind {
    Struct {
        fields: Vec<AggrField>,
        total_size: u64,
        alignment: u64,
    },
    /// `len` is zero until the array type is completed
    Array { elem: IrType, len: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggrField {
    pub ty: IrType,
    pub offset: u64,
}
