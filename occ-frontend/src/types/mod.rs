//! C type system
//!
//! All C types live in the `TypeEnv` arena and are referenced by `TypeRef`
//! handles, so the type graph can be cyclic (a function type can reach
//! itself through a pointer parameter). Pointer types are interned: two
//! requests for "pointer to T" return the identical handle. Array and
//! function types are structural and allocated fresh.

use crate::ir::{AggrField, AggregateKind, IrType, TransUnit};
use occ_common::{AggrId, CompilerError, SourceSpan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Handle into the type arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef(pub u32);

/// Integer conversion rank, per the usual arithmetic conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntRank {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

impl IntRank {
    pub fn bits(self) -> u8 {
        match self {
            IntRank::Char => 8,
            IntRank::Short => 16,
            IntRank::Int => 32,
            IntRank::Long | IntRank::LongLong => 64,
        }
    }
}

/// A struct or union member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CField {
    pub name: String,
    pub ty: TypeRef,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CType {
    Void,
    Integer {
        rank: IntRank,
        signed: bool,
    },
    Pointer {
        pointee: TypeRef,
    },
    Array {
        elem: TypeRef,
        /// None while the array type is incomplete
        len: Option<u64>,
        /// Backing IR array record
        ir: AggrId,
    },
    Struct {
        tag: Option<String>,
        fields: Vec<CField>,
        is_union: bool,
        packed: bool,
        incomplete: bool,
        /// Backing IR aggregate record, present once the type is complete
        ir: Option<AggrId>,
    },
    Function {
        ret: TypeRef,
        params: Vec<TypeRef>,
        variadic: bool,
    },
}

pub fn align_to(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);
    value.div_ceil(alignment) * alignment
}

/// Arena and catalogs for the C types of one translation unit
#[derive(Debug, Clone)]
pub struct TypeEnv {
    types: Vec<CType>,
    pointer_cache: HashMap<TypeRef, TypeRef>,
    pub struct_tags: HashMap<String, TypeRef>,
    pub enum_tags: HashMap<String, TypeRef>,
    pub typedefs: HashMap<String, TypeRef>,

    pub void_type: TypeRef,
    pub char_type: TypeRef,
    pub int_type: TypeRef,
    pub unsigned_long_type: TypeRef,
    /// Pointer-sized integer
    pub int_ptr_type: TypeRef,
    /// The `size_t` analogue
    pub size_type: TypeRef,
}

const INT_RANKS: [IntRank; 5] = [
    IntRank::Char,
    IntRank::Short,
    IntRank::Int,
    IntRank::Long,
    IntRank::LongLong,
];

impl TypeEnv {
    pub fn new() -> Self {
        // Slot 0 is void; the ten integer combinations follow in rank
        // order, signed before unsigned, so `integer()` can index directly.
        let mut types = vec![CType::Void];
        for rank in INT_RANKS {
            types.push(CType::Integer { rank, signed: true });
            types.push(CType::Integer {
                rank,
                signed: false,
            });
        }

        let void_type = TypeRef(0);
        let integer = |rank: IntRank, signed: bool| {
            TypeRef(1 + 2 * rank as u32 + if signed { 0 } else { 1 })
        };
        let unsigned_long = integer(IntRank::Long, false);

        Self {
            types,
            pointer_cache: HashMap::new(),
            struct_tags: HashMap::new(),
            enum_tags: HashMap::new(),
            typedefs: HashMap::new(),
            void_type,
            char_type: integer(IntRank::Char, true),
            int_type: integer(IntRank::Int, true),
            unsigned_long_type: unsigned_long,
            int_ptr_type: unsigned_long,
            size_type: unsigned_long,
        }
    }

    pub fn get(&self, t: TypeRef) -> &CType {
        &self.types[t.0 as usize]
    }

    pub fn get_mut(&mut self, t: TypeRef) -> &mut CType {
        &mut self.types[t.0 as usize]
    }

    fn alloc(&mut self, ctype: CType) -> TypeRef {
        let t = TypeRef(self.types.len() as u32);
        self.types.push(ctype);
        t
    }

    /// The canonical handle for an integer type
    pub fn integer(&self, rank: IntRank, signed: bool) -> TypeRef {
        TypeRef(1 + 2 * rank as u32 + if signed { 0 } else { 1 })
    }

    /// The interned pointer-to-T type
    pub fn pointer_to(&mut self, pointee: TypeRef) -> TypeRef {
        if let Some(&cached) = self.pointer_cache.get(&pointee) {
            return cached;
        }
        let t = self.alloc(CType::Pointer { pointee });
        self.pointer_cache.insert(pointee, t);
        t
    }

    /// A fresh, incomplete array-of-T type with its backing IR record
    pub fn array_of(
        &mut self,
        trans_unit: &mut TransUnit,
        elem: TypeRef,
    ) -> Result<TypeRef, CompilerError> {
        let elem_ir = self.c_type_to_ir(elem)?;
        let ir = trans_unit.add_array_type(elem_ir);
        Ok(self.alloc(CType::Array {
            elem,
            len: None,
            ir,
        }))
    }

    /// Complete an incomplete array type. Completing twice is an error.
    pub fn set_array_length(
        &mut self,
        trans_unit: &mut TransUnit,
        array: TypeRef,
        new_len: u64,
    ) -> Result<(), CompilerError> {
        match self.get_mut(array) {
            CType::Array { len, ir, .. } => {
                if len.is_some() {
                    return Err(CompilerError::internal("array type completed twice"));
                }
                *len = Some(new_len);
                let ir = *ir;
                trans_unit.set_array_type_length(ir, new_len);
                Ok(())
            }
            _ => Err(CompilerError::internal("set_array_length on non-array")),
        }
    }

    /// The type registered for a struct/union tag, creating an incomplete
    /// forward type if the tag is new. Anonymous aggregates pass None and
    /// always get a fresh type.
    pub fn struct_type(&mut self, tag: Option<&str>, is_union: bool) -> TypeRef {
        if let Some(tag) = tag {
            if let Some(&existing) = self.struct_tags.get(tag) {
                return existing;
            }
        }
        let t = self.alloc(CType::Struct {
            tag: tag.map(str::to_string),
            fields: Vec::new(),
            is_union,
            packed: false,
            incomplete: true,
            ir: None,
        });
        if let Some(tag) = tag {
            self.struct_tags.insert(tag.to_string(), t);
        }
        t
    }

    /// A fresh function type. Function types are structural; equality goes
    /// through `type_eq`.
    pub fn function_type(&mut self, ret: TypeRef, params: Vec<TypeRef>, variadic: bool) -> TypeRef {
        self.alloc(CType::Function {
            ret,
            params,
            variadic,
        })
    }

    pub fn c_type_to_ir(&self, t: TypeRef) -> Result<IrType, CompilerError> {
        match self.get(t) {
            CType::Void => Ok(IrType::Void),
            CType::Integer { rank, .. } => Ok(IrType::Int { bits: rank.bits() }),
            CType::Pointer { .. } => Ok(IrType::Ptr),
            CType::Array { ir, .. } => Ok(IrType::Aggregate(*ir)),
            CType::Struct {
                ir, incomplete, tag, ..
            } => {
                if *incomplete {
                    return Err(CompilerError::semantic(
                        format!(
                            "incomplete type 'struct {}' where a complete type is required",
                            tag.as_deref().unwrap_or("<anonymous>")
                        ),
                        SourceSpan::dummy(),
                    ));
                }
                ir.map(IrType::Aggregate)
                    .ok_or_else(|| CompilerError::internal("complete struct without IR record"))
            }
            // Functions only ever travel as addresses
            CType::Function { .. } => Ok(IrType::Ptr),
        }
    }

    pub fn size_of(&self, trans_unit: &TransUnit, t: TypeRef) -> Result<u64, CompilerError> {
        if let CType::Array { len: None, .. } = self.get(t) {
            return Err(CompilerError::semantic(
                "size of incomplete array type",
                SourceSpan::dummy(),
            ));
        }
        Ok(trans_unit.size_of_ir_type(self.c_type_to_ir(t)?))
    }

    pub fn align_of(&self, trans_unit: &TransUnit, t: TypeRef) -> Result<u64, CompilerError> {
        Ok(trans_unit.align_of_ir_type(self.c_type_to_ir(t)?))
    }

    pub fn rank(&self, t: TypeRef) -> Option<IntRank> {
        match self.get(t) {
            CType::Integer { rank, .. } => Some(*rank),
            _ => None,
        }
    }

    pub fn is_signed(&self, t: TypeRef) -> bool {
        matches!(self.get(t), CType::Integer { signed: true, .. })
    }

    pub fn is_integer(&self, t: TypeRef) -> bool {
        matches!(self.get(t), CType::Integer { .. })
    }

    pub fn is_pointer(&self, t: TypeRef) -> bool {
        matches!(self.get(t), CType::Pointer { .. })
    }

    pub fn pointee(&self, t: TypeRef) -> Option<TypeRef> {
        match self.get(t) {
            CType::Pointer { pointee } => Some(*pointee),
            _ => None,
        }
    }

    /// Array-to-pointer and function-to-pointer decay; other types pass
    /// through. Idempotent.
    pub fn decay(&mut self, t: TypeRef) -> TypeRef {
        match self.get(t) {
            CType::Array { elem, .. } => {
                let elem = *elem;
                self.pointer_to(elem)
            }
            CType::Function { .. } => self.pointer_to(t),
            _ => t,
        }
    }

    /// Structural type equality. Interned types compare by handle first.
    pub fn type_eq(&self, a: TypeRef, b: TypeRef) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (CType::Void, CType::Void) => true,
            (
                CType::Integer { rank, signed },
                CType::Integer {
                    rank: rank2,
                    signed: signed2,
                },
            ) => rank == rank2 && signed == signed2,
            (CType::Pointer { pointee }, CType::Pointer { pointee: pointee2 }) => {
                self.type_eq(*pointee, *pointee2)
            }
            (
                CType::Array { elem, len, .. },
                CType::Array {
                    elem: elem2,
                    len: len2,
                    ..
                },
            ) => len == len2 && self.type_eq(*elem, *elem2),
            (
                CType::Function {
                    ret,
                    params,
                    variadic,
                },
                CType::Function {
                    ret: ret2,
                    params: params2,
                    variadic: variadic2,
                },
            ) => {
                variadic == variadic2
                    && params.len() == params2.len()
                    && self.type_eq(*ret, *ret2)
                    && params
                        .iter()
                        .zip(params2.iter())
                        .all(|(&p, &q)| self.type_eq(p, q))
            }
            // Tagged types are nominal: handle inequality means different
            _ => false,
        }
    }

    /// Lay out a complete struct or union definition: compute field
    /// offsets, build the backing IR record, and mark the type complete.
    pub fn define_struct(
        &mut self,
        trans_unit: &mut TransUnit,
        t: TypeRef,
        fields: Vec<(String, TypeRef)>,
        packed: bool,
    ) -> Result<(), CompilerError> {
        let is_union = match self.get(t) {
            CType::Struct { is_union, .. } => *is_union,
            _ => return Err(CompilerError::internal("define_struct on non-struct")),
        };

        let ir = trans_unit.add_struct_type(
            match self.get(t) {
                CType::Struct { tag, .. } => tag.as_deref(),
                _ => unreachable!(),
            },
            fields.len(),
        );

        let mut laid_out = Vec::with_capacity(fields.len());
        let mut ir_fields = Vec::with_capacity(fields.len());
        let mut current_offset = 0u64;
        let mut max_field_size = 0u64;
        let mut max_field_align = 1u64;

        for (name, field_ty) in fields {
            let field_ir = self.c_type_to_ir(field_ty)?;
            let field_size = trans_unit.size_of_ir_type(field_ir);
            let field_align = trans_unit.align_of_ir_type(field_ir);
            max_field_size = max_field_size.max(field_size);
            max_field_align = max_field_align.max(field_align);

            let offset = if is_union {
                0
            } else {
                if !packed {
                    current_offset = align_to(current_offset, field_align);
                }
                let offset = current_offset;
                current_offset += field_size;
                offset
            };

            laid_out.push(CField {
                name,
                ty: field_ty,
                offset,
            });
            ir_fields.push(AggrField {
                ty: field_ir,
                offset,
            });
        }

        let alignment = if packed { 1 } else { max_field_align };
        let total_size = align_to(
            if is_union {
                max_field_size
            } else {
                current_offset
            },
            alignment,
        );

        match &mut trans_unit.aggregate_mut(ir).kind {
            AggregateKind::Struct {
                fields,
                total_size: ts,
                alignment: al,
            } => {
                *fields = ir_fields;
                *ts = total_size;
                *al = alignment;
            }
            AggregateKind::Array { .. } => unreachable!(),
        }

        match self.get_mut(t) {
            CType::Struct {
                fields: f,
                packed: p,
                incomplete,
                ir: ir_slot,
                ..
            } => {
                *f = laid_out;
                *p = packed;
                *incomplete = false;
                *ir_slot = Some(ir);
            }
            _ => unreachable!(),
        }
        Ok(())
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_interning() {
        let mut env = TypeEnv::new();
        let a = env.pointer_to(env.int_type);
        let b = env.pointer_to(env.int_type);
        assert_eq!(a, b);

        let c = env.pointer_to(a);
        let d = env.pointer_to(b);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn test_decay_is_idempotent() {
        let mut env = TypeEnv::new();
        let mut unit = TransUnit::new("test");
        let array = env.array_of(&mut unit, env.int_type).unwrap();
        let once = env.decay(array);
        let twice = env.decay(once);
        assert_eq!(once, twice);
        assert_eq!(env.pointee(once), Some(env.int_type));
    }

    #[test]
    fn test_struct_layout_with_padding() {
        let mut env = TypeEnv::new();
        let mut unit = TransUnit::new("test");
        let t = env.struct_type(Some("s"), false);
        let char_ty = env.char_type;
        let int_ty = env.int_type;
        env.define_struct(
            &mut unit,
            t,
            vec![("c".into(), char_ty), ("i".into(), int_ty)],
            false,
        )
        .unwrap();

        match env.get(t) {
            CType::Struct { fields, .. } => {
                assert_eq!(fields[0].offset, 0);
                assert_eq!(fields[1].offset, 4);
            }
            _ => unreachable!(),
        }
        assert_eq!(env.size_of(&unit, t).unwrap(), 8);
        assert_eq!(env.align_of(&unit, t).unwrap(), 4);
    }

    #[test]
    fn test_packed_struct_layout() {
        let mut env = TypeEnv::new();
        let mut unit = TransUnit::new("test");
        let t = env.struct_type(Some("p"), false);
        let char_ty = env.char_type;
        let int_ty = env.int_type;
        env.define_struct(
            &mut unit,
            t,
            vec![("c".into(), char_ty), ("i".into(), int_ty)],
            true,
        )
        .unwrap();

        match env.get(t) {
            CType::Struct { fields, .. } => {
                assert_eq!(fields[1].offset, 1);
            }
            _ => unreachable!(),
        }
        assert_eq!(env.size_of(&unit, t).unwrap(), 5);
        assert_eq!(env.align_of(&unit, t).unwrap(), 1);
    }

    #[test]
    fn test_union_layout() {
        let mut env = TypeEnv::new();
        let mut unit = TransUnit::new("test");
        let t = env.struct_type(Some("u"), true);
        let char_ty = env.char_type;
        let long_ty = env.integer(IntRank::Long, true);
        env.define_struct(
            &mut unit,
            t,
            vec![("c".into(), char_ty), ("l".into(), long_ty)],
            false,
        )
        .unwrap();

        match env.get(t) {
            CType::Struct { fields, .. } => {
                assert_eq!(fields[0].offset, 0);
                assert_eq!(fields[1].offset, 0);
            }
            _ => unreachable!(),
        }
        assert_eq!(env.size_of(&unit, t).unwrap(), 8);
    }

    #[test]
    fn test_array_completed_once() {
        let mut env = TypeEnv::new();
        let mut unit = TransUnit::new("test");
        let array = env.array_of(&mut unit, env.char_type).unwrap();
        env.set_array_length(&mut unit, array, 4).unwrap();
        assert_eq!(env.size_of(&unit, array).unwrap(), 4);
        assert!(env.set_array_length(&mut unit, array, 8).is_err());
    }

    #[test]
    fn test_incomplete_struct_has_no_size() {
        let mut env = TypeEnv::new();
        let unit = TransUnit::new("test");
        let t = env.struct_type(Some("fwd"), false);
        assert!(env.size_of(&unit, t).is_err());
    }

    #[test]
    fn test_rank_widths() {
        assert_eq!(IntRank::Char.bits(), 8);
        assert_eq!(IntRank::Short.bits(), 16);
        assert_eq!(IntRank::Int.bits(), 32);
        assert_eq!(IntRank::Long.bits(), 64);
        assert_eq!(IntRank::LongLong.bits(), 64);
        assert!(IntRank::Char < IntRank::LongLong);
    }
}
