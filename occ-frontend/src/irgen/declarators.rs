//! Declaration specifiers and declarator folding
//!
//! A declaration-specifier sequence is classified into storage class,
//! function specifier, and a base type; a declarator chain is then folded
//! inside-out around that base type into a `CDecl { name, type }`.

use super::IrGen;
use crate::ast::{
    DeclSpecifier, Declarator, DirectDeclarator, EnumSpecifier, ParameterDecl, StorageClass,
    StructOrUnionSpecifier, TypeName, TypeSpecifier,
};
use crate::irgen::env::{Binding, Term};
use crate::types::{CType, IntRank, TypeRef};
use occ_common::{CompilerError, SourceSpan};

/// A resolved declarator: the declared name (None for abstract
/// declarators) and its type
#[derive(Debug, Clone)]
pub struct CDecl {
    pub name: Option<String>,
    pub ty: TypeRef,
}

impl IrGen<'_> {
    /// Resolve a specifier sequence to its base type, ignoring qualifiers,
    /// storage classes, and function specifiers (callers classify those
    /// separately).
    pub fn decl_specifier_list_to_c_type(
        &mut self,
        specifiers: &[DeclSpecifier],
        span: &SourceSpan,
    ) -> Result<TypeRef, CompilerError> {
        let mut named: Vec<&str> = Vec::new();
        let mut tagged: Option<&TypeSpecifier> = None;

        for spec in specifiers {
            match spec {
                DeclSpecifier::StorageClass(_)
                | DeclSpecifier::TypeQualifier(_)
                | DeclSpecifier::FunctionSpecifier(_) => {}
                DeclSpecifier::TypeSpecifier(ts) => match ts {
                    TypeSpecifier::Named(name) => named.push(name),
                    TypeSpecifier::StructOrUnion(_) | TypeSpecifier::Enum(_) => {
                        tagged = Some(ts);
                    }
                },
            }
        }

        match tagged {
            Some(TypeSpecifier::StructOrUnion(spec)) => {
                self.struct_or_union_specifier_type(spec, span)
            }
            Some(TypeSpecifier::Enum(spec)) => self.enum_specifier_type(spec, span),
            _ => self.named_specifiers_to_type(&named, span),
        }
    }

    /// Match a sequence of type keywords (or a typedef name) against the
    /// canonical table of integer combinations
    fn named_specifiers_to_type(
        &mut self,
        names: &[&str],
        span: &SourceSpan,
    ) -> Result<TypeRef, CompilerError> {
        if names.is_empty() {
            return Err(CompilerError::semantic(
                "declaration without a type specifier",
                span.clone(),
            ));
        }

        // A lone unknown name is a typedef reference
        if names.len() == 1 {
            let name = names[0];
            if !matches!(
                name,
                "void" | "char" | "short" | "int" | "long" | "signed" | "unsigned"
            ) {
                if let Some(&ty) = self.env.types.typedefs.get(name) {
                    return Ok(ty);
                }
                return Err(CompilerError::semantic(
                    format!("unknown type name '{}'", name),
                    span.clone(),
                ));
            }
        }

        let mut void = 0u32;
        let mut char_ = 0u32;
        let mut short = 0u32;
        let mut int = 0u32;
        let mut long = 0u32;
        let mut signed = 0u32;
        let mut unsigned = 0u32;
        for name in names {
            match *name {
                "void" => void += 1,
                "char" => char_ += 1,
                "short" => short += 1,
                "int" => int += 1,
                "long" => long += 1,
                "signed" => signed += 1,
                "unsigned" => unsigned += 1,
                other => {
                    return Err(CompilerError::semantic(
                        format!("unexpected type specifier '{}'", other),
                        span.clone(),
                    ))
                }
            }
        }

        let bad = || {
            CompilerError::semantic(
                format!("invalid type specifier combination '{}'", names.join(" ")),
                span.clone(),
            )
        };

        if signed + unsigned > 1 {
            return Err(bad());
        }
        if void > 0 {
            if names.len() > 1 {
                return Err(bad());
            }
            return Ok(self.env.types.void_type);
        }

        let rank = match (char_, short, int, long) {
            (1, 0, 0, 0) => IntRank::Char,
            (0, 1, 0, 0) | (0, 1, 1, 0) => IntRank::Short,
            (0, 0, 0, 1) | (0, 0, 1, 1) => IntRank::Long,
            (0, 0, 0, 2) | (0, 0, 1, 2) => IntRank::LongLong,
            (0, 0, 1, 0) | (0, 0, 0, 0) => IntRank::Int,
            _ => return Err(bad()),
        };
        // Plain char is signed on this target
        let is_signed = unsigned == 0;
        Ok(self.env.types.integer(rank, is_signed))
    }

    /// Resolve a struct/union specifier: a body-less reference resolves or
    /// forward-declares the tag; a body defines (or completes) the type.
    fn struct_or_union_specifier_type(
        &mut self,
        spec: &StructOrUnionSpecifier,
        span: &SourceSpan,
    ) -> Result<TypeRef, CompilerError> {
        let is_packed = spec.attribute.as_deref() == Some("packed");

        let existing = spec
            .tag
            .as_deref()
            .and_then(|tag| self.env.types.struct_tags.get(tag).copied());

        let field_decls = match &spec.fields {
            None => {
                return match (spec.tag.as_deref(), existing) {
                    (None, _) => Err(CompilerError::semantic(
                        "struct or union specifier without tag or fields",
                        span.clone(),
                    )),
                    (Some(_), Some(t)) => Ok(t),
                    (Some(tag), None) => Ok(self.env.types.struct_type(Some(tag), spec.is_union)),
                };
            }
            Some(fields) => fields,
        };

        let ty = match existing {
            Some(t) => {
                let complete = matches!(
                    self.env.types.get(t),
                    CType::Struct {
                        incomplete: false,
                        ..
                    }
                );
                if complete {
                    return Err(CompilerError::semantic(
                        format!(
                            "redefinition of '{} {}'",
                            if spec.is_union { "union" } else { "struct" },
                            spec.tag.as_deref().unwrap_or("<anonymous>")
                        ),
                        span.clone(),
                    ));
                }
                t
            }
            None => self.env.types.struct_type(spec.tag.as_deref(), spec.is_union),
        };

        let mut fields: Vec<(String, TypeRef)> = Vec::new();
        for field_decl in field_decls {
            let base = self.decl_specifier_list_to_c_type(&field_decl.specifiers, span)?;
            for declarator in &field_decl.declarators {
                let cdecl = self.decl_to_cdecl(base, Some(declarator))?;
                let name = cdecl.name.ok_or_else(|| {
                    CompilerError::semantic("struct field without a name", span.clone())
                })?;
                fields.push((name, cdecl.ty));
            }
        }

        self.env
            .types
            .define_struct(&mut self.builder.trans_unit, ty, fields, is_packed)?;
        Ok(ty)
    }

    /// Resolve an enum specifier. Enum types are aliases of int; the body
    /// binds each enumerator as a compile-time constant in the current
    /// scope, incrementing from the previous value.
    fn enum_specifier_type(
        &mut self,
        spec: &EnumSpecifier,
        span: &SourceSpan,
    ) -> Result<TypeRef, CompilerError> {
        let int_type = self.env.types.int_type;

        let existing = spec
            .tag
            .as_deref()
            .and_then(|tag| self.env.types.enum_tags.get(tag).copied());

        let enumerators = match &spec.enumerators {
            None => {
                return match (spec.tag.as_deref(), existing) {
                    (None, _) => Err(CompilerError::semantic(
                        "enum specifier without tag or enumerators",
                        span.clone(),
                    )),
                    (_, Some(t)) => Ok(t),
                    // TODO: an incomplete enum should be illegal to use;
                    // for now it resolves to int
                    (Some(_), None) => Ok(int_type),
                };
            }
            Some(list) => list,
        };

        if existing.is_some() {
            return Err(CompilerError::semantic(
                format!(
                    "redefinition of 'enum {}'",
                    spec.tag.as_deref().unwrap_or("<anonymous>")
                ),
                span.clone(),
            ));
        }
        if let Some(tag) = spec.tag.as_deref() {
            self.env.types.enum_tags.insert(tag.to_string(), int_type);
        }

        let int_ir = self.env.types.c_type_to_ir(int_type)?;
        let mut current_value = 0u64;
        for enumerator in enumerators {
            if let Some(expr) = &enumerator.value {
                current_value = self.eval_constant_int(expr)?;
            }
            let binding = Binding {
                name: enumerator.name.clone(),
                constant: true,
                term: Term {
                    ctype: int_type,
                    value: crate::ir::Value::const_int(int_ir, current_value),
                },
            };
            self.env.bind(binding, span)?;
            current_value = current_value.wrapping_add(1);
        }

        Ok(int_type)
    }

    /// Fold a declarator chain around the base type, inside-out
    pub fn decl_to_cdecl(
        &mut self,
        ident_type: TypeRef,
        declarator: Option<&Declarator>,
    ) -> Result<CDecl, CompilerError> {
        match declarator {
            None => Ok(CDecl {
                name: None,
                ty: ident_type,
            }),
            Some(Declarator::Pointer(pointee)) => {
                let ptr = self.env.types.pointer_to(ident_type);
                self.decl_to_cdecl(ptr, Some(pointee))
            }
            Some(Declarator::Direct(direct)) => self.direct_declarator_to_cdecl(ident_type, direct),
        }
    }

    fn direct_declarator_to_cdecl(
        &mut self,
        ident_type: TypeRef,
        declarator: &DirectDeclarator,
    ) -> Result<CDecl, CompilerError> {
        match declarator {
            DirectDeclarator::Identifier(name) => Ok(CDecl {
                name: Some(name.clone()),
                ty: ident_type,
            }),
            DirectDeclarator::Nested(inner) => self.decl_to_cdecl(ident_type, Some(inner)),
            DirectDeclarator::Array { inner, len } => {
                let mut cdecl = self.direct_declarator_to_cdecl(ident_type, inner)?;
                let array = self
                    .env
                    .types
                    .array_of(&mut self.builder.trans_unit, cdecl.ty)?;
                if let Some(len_expr) = len {
                    let length = self.eval_constant_int(len_expr.as_ref())?;
                    self.env
                        .types
                        .set_array_length(&mut self.builder.trans_unit, array, length)?;
                }
                cdecl.ty = array;
                Ok(cdecl)
            }
            DirectDeclarator::Function { inner, params } => {
                let mut param_types: Vec<TypeRef> = Vec::new();
                let mut variadic = false;
                for (i, param) in params.iter().enumerate() {
                    match param {
                        ParameterDecl::Ellipsis => {
                            variadic = true;
                            // The grammar puts the ellipsis last
                            debug_assert_eq!(i, params.len() - 1);
                        }
                        ParameterDecl::Decl {
                            specifiers,
                            declarator,
                        } => {
                            let span = SourceSpan::dummy();
                            let base = self.decl_specifier_list_to_c_type(specifiers, &span)?;
                            let cdecl = self.decl_to_cdecl(base, declarator.as_ref())?;
                            // Parameters of array type are adjusted to
                            // pointers to the element type (C 6.7.5.3/7)
                            let adjusted = self.env.types.decay(cdecl.ty);
                            param_types.push(adjusted);
                        }
                    }
                }

                // int foo(void) declares a nullary function
                if param_types.len() == 1
                    && matches!(self.env.types.get(param_types[0]), CType::Void)
                {
                    param_types.clear();
                }

                let function = self
                    .env
                    .types
                    .function_type(ident_type, param_types, variadic);
                self.direct_declarator_to_cdecl(function, inner)
            }
        }
    }

    /// The parameter list of a function declarator, skipping pointer
    /// declarators (for a pointer-returning function)
    pub fn params_for_function_declarator<'d>(
        &self,
        declarator: &'d Declarator,
        span: &SourceSpan,
    ) -> Result<&'d [ParameterDecl], CompilerError> {
        let mut current = declarator;
        loop {
            match current {
                Declarator::Pointer(pointee) => current = pointee,
                Declarator::Direct(DirectDeclarator::Function { params, .. }) => {
                    return Ok(params);
                }
                Declarator::Direct(_) => {
                    return Err(CompilerError::semantic(
                        "function definition requires a function declarator",
                        span.clone(),
                    ));
                }
            }
        }
    }

    /// Resolve a type name, as used by casts, sizeof, and compound literals
    pub fn type_name_to_c_type(
        &mut self,
        type_name: &TypeName,
        span: &SourceSpan,
    ) -> Result<TypeRef, CompilerError> {
        let base = self.decl_specifier_list_to_c_type(&type_name.specifiers, span)?;
        let cdecl = self.decl_to_cdecl(base, type_name.declarator.as_ref())?;
        if cdecl.name.is_some() {
            return Err(CompilerError::semantic(
                "type name must not declare an identifier",
                span.clone(),
            ));
        }
        Ok(cdecl.ty)
    }

    /// Classify the storage classes present in a specifier sequence
    pub fn storage_classes(specifiers: &[DeclSpecifier]) -> Vec<StorageClass> {
        specifiers
            .iter()
            .filter_map(|s| match s {
                DeclSpecifier::StorageClass(sc) => Some(*sc),
                _ => None,
            })
            .collect()
    }
}
