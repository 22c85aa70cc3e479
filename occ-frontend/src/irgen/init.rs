//! Initializer compilation
//!
//! Brace, expression, and designated initializers are first compiled into a
//! `CInit` tree keyed by field/element, with unset slots meaning zero. For
//! static storage the tree is lowered to a constant with zero fill; for
//! automatic storage it becomes a one-shot memset (when the tree is not
//! full) followed by typed stores at layout offsets.

use super::env::{ExprContext, Term};
use super::IrGen;
use crate::ast::{Designator, Initializer, InitializerElement};
use crate::ir::{CastOp, IrBinaryOp, IrConst, IrType, Value, ValueKind};
use crate::types::{CType, TypeRef};
use occ_common::{CompilerError, SourceSpan};

/// Tree mirror of an initialized object
#[derive(Debug, Clone, PartialEq)]
pub enum CInit {
    /// Zero
    Unset,
    Leaf {
        ty: TypeRef,
        value: Value,
    },
    Compound {
        ty: TypeRef,
        elems: Vec<CInit>,
    },
}

fn node_at_path_mut<'a>(root: &'a mut CInit, path: &[usize]) -> &'a mut CInit {
    let mut node = root;
    for &index in path {
        node = match node {
            CInit::Compound { elems, .. } => &mut elems[index],
            _ => unreachable!("designator path descends through compounds"),
        };
    }
    node
}

impl IrGen<'_> {
    /// Number of direct sub-objects of an aggregate type
    fn elem_count(&self, ty: TypeRef, span: &SourceSpan) -> Result<usize, CompilerError> {
        match self.env.types.get(ty) {
            CType::Array { len: Some(len), .. } => Ok(*len as usize),
            CType::Array { len: None, .. } => Err(CompilerError::semantic(
                "initializer for an incomplete array type",
                span.clone(),
            )),
            CType::Struct {
                fields,
                incomplete: false,
                ..
            } => Ok(fields.len()),
            _ => Err(CompilerError::semantic(
                "brace initializer for a non-aggregate type",
                span.clone(),
            )),
        }
    }

    fn elem_type(&self, ty: TypeRef, index: usize, span: &SourceSpan) -> Result<TypeRef, CompilerError> {
        match self.env.types.get(ty) {
            CType::Array { elem, .. } => Ok(*elem),
            CType::Struct { fields, .. } => fields.get(index).map(|f| f.ty).ok_or_else(|| {
                CompilerError::semantic("excess elements in initializer", span.clone())
            }),
            _ => Err(CompilerError::internal("element type of a scalar")),
        }
    }

    pub fn make_c_initializer(
        &mut self,
        ty: TypeRef,
        init: &Initializer,
        const_context: bool,
        span: &SourceSpan,
    ) -> Result<CInit, CompilerError> {
        // A string literal initializing an array expands into per-byte
        // leaves, including the NUL terminator
        if let (
            CType::Array { .. },
            Initializer::Expr(crate::ast::Expr {
                kind: crate::ast::ExprKind::StringLiteral(bytes),
                ..
            }),
        ) = (self.env.types.get(ty), init)
        {
            let bytes = bytes.clone();
            let len = self.elem_count(ty, span)?;
            let char_type = self.env.types.char_type;
            let char_ir = self.env.types.c_type_to_ir(char_type)?;
            let mut elems = vec![CInit::Unset; len];
            for (i, slot) in elems.iter_mut().enumerate().take(bytes.len() + 1) {
                let byte = bytes.get(i).copied().unwrap_or(0);
                *slot = CInit::Leaf {
                    ty: char_type,
                    value: Value::const_int(char_ir, u64::from(byte)),
                };
            }
            return Ok(CInit::Compound { ty, elems });
        }

        match init {
            Initializer::Brace(elements) => {
                self.make_brace_initializer(ty, elements, const_context, span)
            }
            Initializer::Expr(expr) => {
                let value = if const_context {
                    let konst = self.eval_constant_expr(expr)?;
                    match self.env.types.get(ty) {
                        CType::Integer { .. } => match konst {
                            IrConst::Int { ty: int_ty, value } => Value::const_int(int_ty, value),
                            _ => {
                                return Err(CompilerError::semantic(
                                    "integer constant required in initializer",
                                    expr.span.clone(),
                                ))
                            }
                        },
                        CType::Pointer { .. } => match konst {
                            IrConst::Global(Some(id)) => Value::global(id),
                            IrConst::Int { value, .. } => Value::const_int(IrType::Ptr, value),
                            _ => {
                                return Err(CompilerError::semantic(
                                    "address constant required in initializer",
                                    expr.span.clone(),
                                ))
                            }
                        },
                        _ => {
                            return Err(CompilerError::unimplemented(
                                "constant initializer for this type",
                                expr.span.clone(),
                            ))
                        }
                    }
                } else {
                    let term = self.gen_expr(expr, ExprContext::Rvalue)?;
                    self.convert_type(term, ty)?.value
                };
                Ok(CInit::Leaf { ty, value })
            }
        }
    }

    fn make_brace_initializer(
        &mut self,
        ty: TypeRef,
        elements: &[InitializerElement],
        const_context: bool,
        span: &SourceSpan,
    ) -> Result<CInit, CompilerError> {
        let count = self.elem_count(ty, span)?;
        let mut root = CInit::Compound {
            ty,
            elems: vec![CInit::Unset; count],
        };

        // The implicit position advances left to right; a designator list
        // resets it within the current aggregate
        let mut curr_index = 0usize;

        for element in elements {
            let mut path: Vec<usize> = Vec::new();
            let mut containing_ty = ty;

            for (k, designator) in element.designators.iter().enumerate() {
                let (index, field_ty) = match designator {
                    Designator::Field(name) => match self.env.types.get(containing_ty) {
                        CType::Struct { fields, .. } => {
                            let found = fields
                                .iter()
                                .enumerate()
                                .find(|(_, f)| &f.name == name)
                                .map(|(i, f)| (i, f.ty));
                            found.ok_or_else(|| {
                                CompilerError::semantic(
                                    format!("no field named '{}'", name),
                                    span.clone(),
                                )
                            })?
                        }
                        _ => {
                            return Err(CompilerError::semantic(
                                "field designator for a non-struct type",
                                span.clone(),
                            ))
                        }
                    },
                    Designator::Index(expr) => {
                        let elem_ty = match self.env.types.get(containing_ty) {
                            CType::Array { elem, .. } => *elem,
                            _ => {
                                return Err(CompilerError::semantic(
                                    "index designator for a non-array type",
                                    span.clone(),
                                ))
                            }
                        };
                        let index = self.eval_constant_int(expr)? as usize;
                        (index, elem_ty)
                    }
                };

                if index >= self.elem_count(containing_ty, span)? {
                    return Err(CompilerError::semantic(
                        "designator outside the initialized object",
                        span.clone(),
                    ));
                }

                if k + 1 < element.designators.len() {
                    // Descend: the designated slot must itself be an
                    // aggregate, lazily allocated
                    let inner_count = self.elem_count(field_ty, span)?;
                    let parent = node_at_path_mut(&mut root, &path);
                    let slot = match parent {
                        CInit::Compound { elems, .. } => &mut elems[index],
                        _ => unreachable!(),
                    };
                    if matches!(slot, CInit::Unset) {
                        *slot = CInit::Compound {
                            ty: field_ty,
                            elems: vec![CInit::Unset; inner_count],
                        };
                    }
                    path.push(index);
                    containing_ty = field_ty;
                } else {
                    curr_index = index;
                }
            }

            if curr_index >= self.elem_count(containing_ty, span)? {
                return Err(CompilerError::semantic(
                    "excess elements in initializer",
                    span.clone(),
                ));
            }
            let elem_ty = self.elem_type(containing_ty, curr_index, span)?;
            let sub = self.make_c_initializer(elem_ty, &element.init, const_context, span)?;

            let containing = node_at_path_mut(&mut root, &path);
            match containing {
                CInit::Compound { elems, .. } => elems[curr_index] = sub,
                _ => unreachable!(),
            }
            curr_index += 1;
        }

        Ok(root)
    }

    /// Lower an initializer into stores against automatic storage
    pub fn gen_initializer(
        &mut self,
        to_init: Term,
        init: &Initializer,
        span: &SourceSpan,
    ) -> Result<(), CompilerError> {
        let c_init = self.make_c_initializer(to_init.ctype, init, false, span)?;

        if !is_full_initializer(&c_init) {
            let size = self
                .env
                .types
                .size_of(&self.builder.trans_unit, to_init.ctype)?;
            let int_ir = self.env.types.c_type_to_ir(self.env.types.int_type)?;
            let memset = self.builder.builtin_memset();
            let args = vec![
                to_init.value,
                Value::const_int(int_ir, 0),
                Value::const_int(IrType::Int { bits: 64 }, size),
            ];
            self.builder.build_call(memset, IrType::Ptr, args)?;
        }

        let base_ptr = self
            .builder
            .build_cast(CastOp::Cast, to_init.value, IrType::Int { bits: 64 })?;
        self.gen_c_init(base_ptr, &c_init, 0)
    }

    fn gen_c_init(
        &mut self,
        base_ptr: Value,
        c_init: &CInit,
        current_offset: u64,
    ) -> Result<(), CompilerError> {
        match c_init {
            CInit::Unset => Ok(()),
            CInit::Compound { ty, elems } => {
                // Offsets of each sub-object within the aggregate
                let offsets: Vec<u64> = match self.env.types.get(*ty) {
                    CType::Array { elem, .. } => {
                        let elem = *elem;
                        let elem_size = self.env.types.size_of(&self.builder.trans_unit, elem)?;
                        (0..elems.len() as u64).map(|i| i * elem_size).collect()
                    }
                    CType::Struct { fields, .. } => fields.iter().map(|f| f.offset).collect(),
                    _ => return Err(CompilerError::internal("compound initializer for scalar")),
                };
                for (sub, offset) in elems.iter().zip(offsets) {
                    self.gen_c_init(base_ptr, sub, current_offset + offset)?;
                }
                Ok(())
            }
            CInit::Leaf { ty, value } => {
                let ty = *ty;
                let int64 = IrType::Int { bits: 64 };
                let aggregate = matches!(
                    self.env.types.get(ty),
                    CType::Struct { .. } | CType::Array { .. }
                );
                if aggregate {
                    // A whole-aggregate leaf (e.g. a struct-valued
                    // expression) is a byte copy
                    let size = self.env.types.size_of(&self.builder.trans_unit, ty)?;
                    let dest = self.builder.build_binary(
                        IrBinaryOp::Add,
                        base_ptr,
                        Value::const_int(int64, current_offset),
                    )?;
                    let memcpy = self.builder.builtin_memcpy();
                    let args = vec![dest, *value, Value::const_int(int64, size)];
                    self.builder.build_call(memcpy, IrType::Ptr, args)?;
                } else {
                    let field_ptr = self.builder.build_binary(
                        IrBinaryOp::Add,
                        base_ptr,
                        Value::const_int(int64, current_offset),
                    )?;
                    self.builder.build_store(field_ptr, *value)?;
                }
                Ok(())
            }
        }
    }

    /// Complete an incomplete array type from its initializer: the highest
    /// initialized index plus one, or the string length plus one
    pub fn infer_array_size_from_initializer(
        &mut self,
        init: Option<&Initializer>,
        ty: TypeRef,
    ) -> Result<(), CompilerError> {
        if !matches!(self.env.types.get(ty), CType::Array { len: None, .. }) {
            return Ok(());
        }
        let Some(init) = init else { return Ok(()) };

        let size = match init {
            Initializer::Brace(elements) => {
                let mut current_index: i64 = -1;
                let mut max_index: i64 = -1;
                for element in elements {
                    match element.designators.first() {
                        Some(Designator::Index(expr)) => {
                            current_index = self.eval_constant_int(expr)? as i64;
                        }
                        Some(Designator::Field(_)) => {
                            return Err(CompilerError::semantic(
                                "field designator for a non-array type",
                                expr_span(init),
                            ));
                        }
                        None => current_index += 1,
                    }
                    max_index = max_index.max(current_index);
                }
                (max_index + 1) as u64
            }
            Initializer::Expr(expr) => match &expr.kind {
                crate::ast::ExprKind::StringLiteral(bytes) => bytes.len() as u64 + 1,
                _ => {
                    return Err(CompilerError::semantic(
                        "array initializer must be a brace list or string literal",
                        expr.span.clone(),
                    ))
                }
            },
        };

        self.env
            .types
            .set_array_length(&mut self.builder.trans_unit, ty, size)
    }

    /// The all-zero constant for a type
    pub fn zero_initializer(&self, ty: TypeRef) -> Result<IrConst, CompilerError> {
        match self.env.types.get(ty) {
            CType::Integer { .. } => Ok(IrConst::Int {
                ty: self.env.types.c_type_to_ir(ty)?,
                value: 0,
            }),
            CType::Pointer { .. } => Ok(IrConst::Global(None)),
            CType::Array {
                elem,
                len: Some(len),
                ..
            } => {
                let elem = *elem;
                let len = *len;
                let elem_zero = self.zero_initializer(elem)?;
                Ok(IrConst::Array {
                    ty: self.env.types.c_type_to_ir(ty)?,
                    elems: vec![elem_zero; len as usize],
                })
            }
            CType::Struct {
                fields,
                incomplete: false,
                ..
            } => {
                let field_types: Vec<TypeRef> = fields.iter().map(|f| f.ty).collect();
                let zeros = field_types
                    .into_iter()
                    .map(|f| self.zero_initializer(f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(IrConst::Struct {
                    ty: self.env.types.c_type_to_ir(ty)?,
                    fields: zeros,
                })
            }
            _ => Err(CompilerError::semantic(
                "cannot zero-initialize an incomplete type",
                SourceSpan::dummy(),
            )),
        }
    }

    /// Lower a CInit to a constant, zero-filling unset slots
    pub fn const_gen_c_init(&self, c_init: &CInit) -> Result<IrConst, CompilerError> {
        match c_init {
            CInit::Unset => Err(CompilerError::internal("const of an unset initializer root")),
            CInit::Leaf { ty, value } => {
                let ty = *ty;
                match self.env.types.get(ty) {
                    CType::Integer { .. } => match value.kind {
                        ValueKind::Const(v) => Ok(IrConst::Int {
                            ty: self.env.types.c_type_to_ir(ty)?,
                            value: v,
                        }),
                        _ => Err(CompilerError::internal("non-constant leaf in const init")),
                    },
                    CType::Pointer { .. } => match value.kind {
                        ValueKind::Global(id) => Ok(IrConst::Global(Some(id))),
                        ValueKind::Const(0) => Ok(IrConst::Global(None)),
                        ValueKind::Const(v) => Ok(IrConst::Int {
                            ty: IrType::Ptr,
                            value: v,
                        }),
                        _ => Err(CompilerError::internal("non-constant leaf in const init")),
                    },
                    _ => Err(CompilerError::unimplemented(
                        "constant initializer for this type",
                        SourceSpan::dummy(),
                    )),
                }
            }
            CInit::Compound { ty, elems } => {
                let ty = *ty;
                let elem_types: Vec<TypeRef> = match self.env.types.get(ty) {
                    CType::Array { elem, .. } => vec![*elem; elems.len()],
                    CType::Struct { fields, .. } => fields.iter().map(|f| f.ty).collect(),
                    _ => return Err(CompilerError::internal("compound init for scalar")),
                };
                let parts = elems
                    .iter()
                    .zip(elem_types)
                    .map(|(sub, elem_ty)| match sub {
                        CInit::Unset => self.zero_initializer(elem_ty),
                        _ => self.const_gen_c_init(sub),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let ir = self.env.types.c_type_to_ir(ty)?;
                match self.env.types.get(ty) {
                    CType::Array { .. } => Ok(IrConst::Array {
                        ty: ir,
                        elems: parts,
                    }),
                    _ => Ok(IrConst::Struct {
                        ty: ir,
                        fields: parts,
                    }),
                }
            }
        }
    }
}

/// Whether every reachable slot is set; a partial tree needs a zero fill
pub fn is_full_initializer(c_init: &CInit) -> bool {
    match c_init {
        CInit::Unset => false,
        CInit::Leaf { .. } => true,
        CInit::Compound { elems, .. } => elems.iter().all(is_full_initializer),
    }
}

fn expr_span(init: &Initializer) -> SourceSpan {
    match init {
        Initializer::Expr(expr) => expr.span.clone(),
        Initializer::Brace(elements) => elements
            .first()
            .map(|e| expr_span(&e.init))
            .unwrap_or_else(SourceSpan::dummy),
    }
}
