//! Translation-unit container, globals, and constants

use super::function::IrFunction;
use super::types::{AggrField, AggregateKind, AggregateType, IrType, POINTER_BITS};
use occ_common::{AggrId, GlobalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Linkage of a global symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    /// Visible to other translation units
    Global,
    /// `static` - confined to this unit
    Local,
}

/// Declared IR signature of a function global
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GlobalKind {
    Var,
    Function(FunctionSig),
}

/// A global symbol: variable or function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrGlobal {
    pub name: String,
    pub ty: IrType,
    pub kind: GlobalKind,
    pub linkage: Linkage,
    /// None for externals and undefined functions
    pub init: Option<IrConst>,
}

/// A constant initializer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrConst {
    Int { ty: IrType, value: u64 },
    /// Address constant; None is the null pointer
    Global(Option<GlobalId>),
    Array { ty: IrType, elems: Vec<IrConst> },
    Struct { ty: IrType, fields: Vec<IrConst> },
    /// A function body
    Function(IrFunction),
}

impl IrConst {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            IrConst::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&IrFunction> {
        match self {
            IrConst::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// A complete compilation unit: globals plus aggregate type records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransUnit {
    pub name: String,
    pub globals: Vec<IrGlobal>,
    pub aggregates: Vec<AggregateType>,
}

impl TransUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            globals: Vec::new(),
            aggregates: Vec::new(),
        }
    }

    pub fn global(&self, id: GlobalId) -> &IrGlobal {
        &self.globals[id as usize]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut IrGlobal {
        &mut self.globals[id as usize]
    }

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|g| g.name == name)
            .map(|i| i as GlobalId)
    }

    /// Add a function global, or return the existing one with this name
    pub fn add_function(&mut self, name: &str, sig: FunctionSig) -> GlobalId {
        if let Some(id) = self.global_by_name(name) {
            return id;
        }
        let id = self.globals.len() as GlobalId;
        self.globals.push(IrGlobal {
            name: name.to_string(),
            ty: IrType::Ptr,
            kind: GlobalKind::Function(sig),
            linkage: Linkage::Global,
            init: None,
        });
        id
    }

    /// Add a variable global, or return the existing one with this name
    pub fn add_var(&mut self, name: &str, ty: IrType) -> GlobalId {
        if let Some(id) = self.global_by_name(name) {
            return id;
        }
        let id = self.globals.len() as GlobalId;
        self.globals.push(IrGlobal {
            name: name.to_string(),
            ty,
            kind: GlobalKind::Var,
            linkage: Linkage::Global,
            init: None,
        });
        id
    }

    /// Attach a lowered body to a function global
    pub fn attach_function_body(&mut self, id: GlobalId, body: IrFunction) {
        self.global_mut(id).init = Some(IrConst::Function(body));
    }

    /// The lowered body of the named function, if any
    pub fn function_body(&self, name: &str) -> Option<&IrFunction> {
        let id = self.global_by_name(name)?;
        self.global(id).init.as_ref()?.as_function()
    }

    /// Register a struct aggregate record with unfilled fields
    pub fn add_struct_type(&mut self, name: Option<&str>, field_count: usize) -> AggrId {
        let id = self.aggregates.len() as AggrId;
        self.aggregates.push(AggregateType {
            name: name.map(str::to_string),
            kind: AggregateKind::Struct {
                fields: vec![
                    AggrField {
                        ty: IrType::Void,
                        offset: 0
                    };
                    field_count
                ],
                total_size: 0,
                alignment: 1,
            },
        });
        id
    }

    /// Register an array aggregate record; length zero until completed
    pub fn add_array_type(&mut self, elem: IrType) -> AggrId {
        let id = self.aggregates.len() as AggrId;
        self.aggregates.push(AggregateType {
            name: None,
            kind: AggregateKind::Array { elem, len: 0 },
        });
        id
    }

    pub fn aggregate(&self, id: AggrId) -> &AggregateType {
        &self.aggregates[id as usize]
    }

    pub fn aggregate_mut(&mut self, id: AggrId) -> &mut AggregateType {
        &mut self.aggregates[id as usize]
    }

    pub fn set_array_type_length(&mut self, id: AggrId, new_len: u64) {
        match &mut self.aggregate_mut(id).kind {
            AggregateKind::Array { len, .. } => *len = new_len,
            AggregateKind::Struct { .. } => unreachable!("not an array type"),
        }
    }

    pub fn size_of_ir_type(&self, ty: IrType) -> u64 {
        match ty {
            IrType::Void => 0,
            IrType::Int { bits } => u64::from(bits) / 8,
            IrType::Ptr => u64::from(POINTER_BITS) / 8,
            IrType::Aggregate(id) => match &self.aggregate(id).kind {
                AggregateKind::Struct { total_size, .. } => *total_size,
                AggregateKind::Array { elem, len } => self.size_of_ir_type(*elem) * len,
            },
        }
    }

    pub fn align_of_ir_type(&self, ty: IrType) -> u64 {
        match ty {
            IrType::Void => 1,
            IrType::Int { bits } => u64::from(bits) / 8,
            IrType::Ptr => u64::from(POINTER_BITS) / 8,
            IrType::Aggregate(id) => match &self.aggregate(id).kind {
                AggregateKind::Struct { alignment, .. } => *alignment,
                AggregateKind::Array { elem, .. } => self.align_of_ir_type(*elem),
            },
        }
    }
}

impl fmt::Display for TransUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in &self.globals {
            let linkage = match global.linkage {
                Linkage::Global => "global",
                Linkage::Local => "local",
            };
            match &global.init {
                Some(IrConst::Function(body)) => {
                    writeln!(f, "{} function @{} {{", linkage, global.name)?;
                    write!(f, "{}", body)?;
                    writeln!(f, "}}")?;
                }
                Some(konst) => {
                    writeln!(f, "{} @{} : {} = {}", linkage, global.name, global.ty, konst)?;
                }
                None => {
                    writeln!(f, "{} @{} : {} = external", linkage, global.name, global.ty)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for IrConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrConst::Int { value, .. } => write!(f, "{}", value),
            IrConst::Global(Some(id)) => write!(f, "@{}", id),
            IrConst::Global(None) => write!(f, "null"),
            IrConst::Array { elems, .. } => {
                write!(f, "[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            IrConst::Struct { fields, .. } => {
                write!(f, "{{")?;
                for (i, e) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "}}")
            }
            IrConst::Function(_) => write!(f, "<function>"),
        }
    }
}
