//! IR generation
//!
//! A single pass over the AST forest that emits IR into a translation-unit
//! container: function definitions are lowered to CFGs of basic blocks,
//! global declarations become constants, inline function bodies are
//! deferred until their out-of-line declaration arrives, and goto branches
//! are patched once their function's labels are all known.

mod const_eval;
mod convert;
mod declarators;
pub mod env;
mod expr;
mod init;
mod stmt;

pub use declarators::CDecl;
pub use env::{Env, ExprContext, Term};
pub use init::{is_full_initializer, CInit};

use crate::ast::{
    Decl, DeclSpecifier, FunctionDef, FunctionSpecifier, Initializer, ParameterDecl, StorageClass,
    Toplevel, TranslationUnit,
};
use crate::ir::{FunctionSig, GlobalKind, IrBuilder, IrType, Linkage, TransUnit, Value};
use crate::types::{CType, TypeRef};
use env::{Binding, InlineFunction};
use log::debug;
use occ_common::{CompilerError, GlobalId, SourceSpan};

/// The lowering pass: a builder for the IR under construction plus the
/// mutable environment
pub struct IrGen<'a> {
    pub builder: &'a mut IrBuilder,
    pub env: &'a mut Env,
}

/// Lower a parsed translation unit into IR. All-or-nothing: on error no
/// partial IR is returned.
pub fn lower_translation_unit(
    ast: &TranslationUnit,
    unit_name: &str,
) -> Result<TransUnit, CompilerError> {
    let mut builder = IrBuilder::new(unit_name);
    let mut env = Env::new();
    IrGen {
        builder: &mut builder,
        env: &mut env,
    }
    .run(ast)?;
    Ok(builder.trans_unit)
}

impl IrGen<'_> {
    fn run(&mut self, ast: &TranslationUnit) -> Result<(), CompilerError> {
        for (index, item) in ast.items.iter().enumerate() {
            match item {
                Toplevel::FunctionDef(def) => self.gen_function_def(index, def)?,
                Toplevel::Decl(decl) => self.gen_global_decl(ast, decl)?,
            }
        }
        Ok(())
    }

    fn gen_function_def(&mut self, index: usize, def: &FunctionDef) -> Result<(), CompilerError> {
        let mut linkage = Linkage::Global;
        for storage in Self::storage_classes(&def.specifiers) {
            match storage {
                StorageClass::Static => linkage = Linkage::Local,
                other => {
                    return Err(CompilerError::unimplemented(
                        format!("'{:?}' storage class on a function definition", other),
                        def.span.clone(),
                    ))
                }
            }
        }
        let is_inline = def
            .specifiers
            .iter()
            .any(|s| matches!(s, DeclSpecifier::FunctionSpecifier(FunctionSpecifier::Inline)));

        let base = self.decl_specifier_list_to_c_type(&def.specifiers, &def.span)?;
        let (global, function_type) = self.global_for_decl(base, &def.declarator, None, &def.span)?;
        self.builder.trans_unit.global_mut(global).linkage = linkage;

        let name = self.builder.trans_unit.global(global).name.clone();
        self.env.bind_global(Binding {
            name,
            constant: false,
            term: Term {
                ctype: function_type,
                value: Value::global(global),
            },
        });

        if is_inline {
            // The body is emitted when a matching `extern inline`
            // redeclaration is seen
            self.env.inline_functions.push(InlineFunction {
                global,
                function_type,
                def_index: index,
            });
            Ok(())
        } else {
            self.gen_function(global, function_type, def)
        }
    }

    fn gen_global_decl(
        &mut self,
        ast: &TranslationUnit,
        decl: &Decl,
    ) -> Result<(), CompilerError> {
        // `extern inline <signature>;` triggers emission of the deferred
        // inline body with that signature
        if matches!(
            decl.specifiers.first(),
            Some(DeclSpecifier::StorageClass(StorageClass::Extern))
        ) && matches!(
            decl.specifiers.get(1),
            Some(DeclSpecifier::FunctionSpecifier(FunctionSpecifier::Inline))
        ) {
            return self.activate_inline_function(ast, decl);
        }

        let storage = Self::storage_classes(&decl.specifiers);

        if storage.contains(&StorageClass::Typedef) {
            let base = self.decl_specifier_list_to_c_type(&decl.specifiers, &decl.span)?;
            for init_declarator in &decl.init_declarators {
                if init_declarator.init.is_some() {
                    return Err(CompilerError::semantic(
                        "typedef declaration cannot have an initializer",
                        decl.span.clone(),
                    ));
                }
                let cdecl = self.decl_to_cdecl(base, Some(&init_declarator.declarator))?;
                let name = cdecl.name.ok_or_else(|| {
                    CompilerError::semantic("typedef without a name", decl.span.clone())
                })?;
                self.env.types.typedefs.insert(name, cdecl.ty);
            }
            return Ok(());
        }

        for storage_class in &storage {
            match storage_class {
                StorageClass::Static | StorageClass::Extern => {}
                other => {
                    return Err(CompilerError::unimplemented(
                        format!("'{:?}' storage class at file scope", other),
                        decl.span.clone(),
                    ))
                }
            }
        }

        if decl.init_declarators.is_empty() {
            // A bare struct/union/enum declaration; resolve it for its
            // side effects on the type environment
            self.decl_specifier_list_to_c_type(&decl.specifiers, &decl.span)?;
            return Ok(());
        }

        let base = self.decl_specifier_list_to_c_type(&decl.specifiers, &decl.span)?;
        for init_declarator in &decl.init_declarators {
            let (global, global_type) = self.global_for_decl(
                base,
                &init_declarator.declarator,
                init_declarator.init.as_ref(),
                &decl.span,
            )?;

            let is_function = matches!(self.env.types.get(global_type), CType::Function { .. });
            let mut is_extern = is_function;
            let mut linkage = Linkage::Global;
            for storage_class in &storage {
                match storage_class {
                    StorageClass::Static => linkage = Linkage::Local,
                    StorageClass::Extern => is_extern = true,
                    _ => unreachable!("rejected above"),
                }
            }
            self.builder.trans_unit.global_mut(global).linkage = linkage;

            let name = self.builder.trans_unit.global(global).name.clone();
            debug!("global '{}'", name);
            self.env.bind_global(Binding {
                name,
                constant: false,
                term: Term {
                    ctype: global_type,
                    value: Value::global(global),
                },
            });

            match &init_declarator.init {
                None => {
                    if !is_extern {
                        let zero = self.zero_initializer(global_type)?;
                        self.builder.trans_unit.global_mut(global).init = Some(zero);
                    }
                }
                Some(init) => {
                    if is_extern {
                        return Err(CompilerError::semantic(
                            "an extern declaration cannot have an initializer",
                            decl.span.clone(),
                        ));
                    }
                    let c_init = self.make_c_initializer(global_type, init, true, &decl.span)?;
                    let konst = self.const_gen_c_init(&c_init)?;
                    self.builder.trans_unit.global_mut(global).init = Some(konst);
                }
            }
        }
        Ok(())
    }

    fn activate_inline_function(
        &mut self,
        ast: &TranslationUnit,
        decl: &Decl,
    ) -> Result<(), CompilerError> {
        let init_declarator = decl.init_declarators.first().ok_or_else(|| {
            CompilerError::semantic("declaration without a declarator", decl.span.clone())
        })?;
        let base = self.decl_specifier_list_to_c_type(&decl.specifiers[2..], &decl.span)?;
        let cdecl = self.decl_to_cdecl(base, Some(&init_declarator.declarator))?;
        let name = cdecl.name.ok_or_else(|| {
            CompilerError::semantic("declaration without a name", decl.span.clone())
        })?;

        let matching = self
            .env
            .inline_functions
            .iter()
            .find(|f| self.builder.trans_unit.global(f.global).name == name)
            .copied()
            .ok_or_else(|| {
                CompilerError::semantic(
                    format!("no inline definition of '{}' to instantiate", name),
                    decl.span.clone(),
                )
            })?;

        if !self.env.types.type_eq(cdecl.ty, matching.function_type) {
            return Err(CompilerError::semantic(
                format!("conflicting types for '{}'", name),
                decl.span.clone(),
            ));
        }

        let def = match &ast.items[matching.def_index] {
            Toplevel::FunctionDef(def) => def,
            Toplevel::Decl(_) => {
                return Err(CompilerError::internal("inline deferral points at a declaration"))
            }
        };
        self.gen_function(matching.global, matching.function_type, def)
    }

    /// Resolve a declarator against the specifier base type and register
    /// (or find) the corresponding IR global
    fn global_for_decl(
        &mut self,
        base: TypeRef,
        declarator: &crate::ast::Declarator,
        init: Option<&Initializer>,
        span: &SourceSpan,
    ) -> Result<(GlobalId, TypeRef), CompilerError> {
        let cdecl = self.decl_to_cdecl(base, Some(declarator))?;
        self.infer_array_size_from_initializer(init, cdecl.ty)?;

        let name = cdecl.name.ok_or_else(|| {
            CompilerError::semantic("declaration without an identifier", span.clone())
        })?;

        match self.env.types.get(cdecl.ty) {
            CType::Function {
                ret,
                params,
                variadic,
            } => {
                let (ret, params, variadic) = (*ret, params.clone(), *variadic);
                // Struct returns become an implicit leading pointer
                // parameter; the IR function then returns void
                let struct_ret = matches!(self.env.types.get(ret), CType::Struct { .. });

                let mut ir_params = Vec::with_capacity(params.len() + usize::from(struct_ret));
                if struct_ret {
                    ir_params.push(IrType::Ptr);
                }
                for param in &params {
                    ir_params.push(self.env.types.c_type_to_ir(*param)?);
                }
                let ret_ir = if struct_ret {
                    IrType::Void
                } else {
                    self.env.types.c_type_to_ir(ret)?
                };

                // TODO: check that a redeclaration's C type matches
                let id = self.builder.trans_unit.add_function(
                    &name,
                    FunctionSig {
                        ret: ret_ir,
                        params: ir_params,
                        variadic,
                    },
                );
                Ok((id, cdecl.ty))
            }
            _ => {
                let ir = self.env.types.c_type_to_ir(cdecl.ty)?;
                let id = self.builder.trans_unit.add_var(&name, ir);
                Ok((id, cdecl.ty))
            }
        }
    }

    /// Lower one function body
    fn gen_function(
        &mut self,
        global: GlobalId,
        function_type: TypeRef,
        def: &FunctionDef,
    ) -> Result<(), CompilerError> {
        if !def.old_style_param_decls.is_empty() {
            return Err(CompilerError::unimplemented(
                "old-style parameter declarations",
                def.span.clone(),
            ));
        }

        debug!(
            "lowering function '{}'",
            self.builder.trans_unit.global(global).name
        );

        self.builder.start_function();
        self.env.push_scope();
        let prev_function_type = self.env.current_function_type.replace(function_type);
        let saved_labels = std::mem::take(&mut self.env.goto_labels);
        let saved_fixups = std::mem::take(&mut self.env.goto_fixups);

        let (return_type, param_types) = match self.env.types.get(function_type) {
            CType::Function { ret, params, .. } => (*ret, params.clone()),
            _ => return Err(CompilerError::internal("function global without function type")),
        };
        let struct_ret = matches!(self.env.types.get(return_type), CType::Struct { .. });
        let sig_params = match &self.builder.trans_unit.global(global).kind {
            GlobalKind::Function(sig) => sig.params.clone(),
            GlobalKind::Var => {
                return Err(CompilerError::internal("function body for a variable global"))
            }
        };

        // Parameter declarators are re-resolved here for their names; the
        // adjusted types come from the function type itself
        let params_ast = self.params_for_function_declarator(&def.declarator, &def.span)?;
        let mut index = 0usize;
        for param in params_ast {
            let ParameterDecl::Decl {
                specifiers,
                declarator,
            } = param
            else {
                continue;
            };

            let base = self.decl_specifier_list_to_c_type(specifiers, &def.span)?;
            let cdecl = self.decl_to_cdecl(base, declarator.as_ref())?;
            if matches!(self.env.types.get(cdecl.ty), CType::Void) {
                // The sole parameter of int f(void)
                if index == 0 && cdecl.name.is_none() {
                    break;
                }
                return Err(CompilerError::semantic(
                    "parameter has void type",
                    def.span.clone(),
                ));
            }

            let param_type = *param_types.get(index).ok_or_else(|| {
                CompilerError::internal("more parameter declarators than parameter types")
            })?;
            let name = cdecl.name.clone().ok_or_else(|| {
                CompilerError::semantic("parameter name omitted", def.span.clone())
            })?;

            let ir = self.env.types.c_type_to_ir(param_type)?;
            let local = self.builder.build_local(ir)?;
            let binding_term = Term {
                ctype: param_type,
                value: local,
            };
            self.env.bind(
                Binding {
                    name,
                    constant: false,
                    term: binding_term,
                },
                &def.span,
            )?;

            // With a struct return the IR arguments are shifted by one
            let ir_arg_index = index + usize::from(struct_ret);
            let arg_ir = *sig_params.get(ir_arg_index).ok_or_else(|| {
                CompilerError::internal("parameter index outside the IR signature")
            })?;
            let arg = Term {
                ctype: param_type,
                value: Value::arg(ir_arg_index as u32, arg_ir),
            };
            self.gen_assign_op(binding_term, arg, None, &def.span)?;
            index += 1;
        }

        self.gen_statement(&def.body)?;

        if !self.builder.current_block_has_terminator() {
            // Every block must end in a terminator. This ret is only
            // reachable when control falls off the end of the function;
            // whether that is valid is the backend's concern.
            self.builder.build_ret_void()?;
        }

        // Resolve this function's gotos now that all labels are known
        let fixups = std::mem::take(&mut self.env.goto_fixups);
        for fixup in fixups {
            let target = self
                .env
                .goto_labels
                .iter()
                .find(|label| label.name == fixup.label)
                .ok_or_else(|| {
                    CompilerError::semantic(
                        format!("use of undeclared label '{}'", fixup.label),
                        fixup.span.clone(),
                    )
                })?;
            self.builder.patch_branch(fixup.instr, target.block)?;
        }

        let body = self.builder.finish_function()?;
        self.builder.trans_unit.attach_function_body(global, body);

        self.env.goto_labels = saved_labels;
        self.env.goto_fixups = saved_fixups;
        self.env.current_function_type = prev_function_type;
        self.env.pop_scope();
        Ok(())
    }

    /// Lower a block-scope declaration: allocate a local per declarator
    /// and run its initializer
    fn add_decl_to_scope(&mut self, decl: &Decl) -> Result<(), CompilerError> {
        let base = self.decl_specifier_list_to_c_type(&decl.specifiers, &decl.span)?;
        for init_declarator in &decl.init_declarators {
            let cdecl = self.decl_to_cdecl(base, Some(&init_declarator.declarator))?;
            self.infer_array_size_from_initializer(init_declarator.init.as_ref(), cdecl.ty)?;

            let name = cdecl.name.ok_or_else(|| {
                CompilerError::semantic("declaration without an identifier", decl.span.clone())
            })?;

            let ir = self.env.types.c_type_to_ir(cdecl.ty)?;
            let local = self.builder.build_local(ir)?;
            let term = Term {
                ctype: cdecl.ty,
                value: local,
            };
            self.env.bind(
                Binding {
                    name,
                    constant: false,
                    term,
                },
                &decl.span,
            )?;

            let Some(init) = &init_declarator.init else {
                continue;
            };

            // A scalar expression initializer stores directly instead of
            // going through the general path, which would zero the object
            // first
            let string_into_array = matches!(
                init,
                Initializer::Expr(expr)
                    if matches!(expr.kind, crate::ast::ExprKind::StringLiteral(_))
            ) && matches!(self.env.types.get(cdecl.ty), CType::Array { .. });

            match init {
                Initializer::Expr(expr) if !string_into_array => {
                    let init_term = self.gen_expr(expr, ExprContext::Rvalue)?;
                    self.gen_assign_op(term, init_term, None, &decl.span)?;
                }
                _ => self.gen_initializer(term, init, &decl.span)?,
            }
        }
        Ok(())
    }
}
