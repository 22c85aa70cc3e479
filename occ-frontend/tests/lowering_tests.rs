//! End-to-end lowering tests
//!
//! These construct small ASTs programmatically (the parser lives outside
//! this crate) and assert on the shape of the resulting IR.

use occ_common::SourceSpan;
use occ_frontend::ast::*;
use occ_frontend::ir::{
    AggregateKind, Instr, IrCmp, IrConst, IrFunction, IrType, Linkage, TransUnit, ValueKind,
};
use occ_frontend::lower_translation_unit;

fn sp() -> SourceSpan {
    SourceSpan::dummy()
}

fn e(kind: ExprKind) -> Expr {
    Expr::new(kind, sp())
}

fn st(kind: StatementKind) -> Statement {
    Statement::new(kind, sp())
}

fn named(name: &str) -> DeclSpecifier {
    DeclSpecifier::TypeSpecifier(TypeSpecifier::Named(name.to_string()))
}

fn int_specs() -> Vec<DeclSpecifier> {
    vec![named("int")]
}

fn ident(name: &str) -> Expr {
    e(ExprKind::Identifier(name.to_string()))
}

fn lit(value: u64) -> Expr {
    e(ExprKind::IntLiteral {
        value,
        suffix: IntSuffix::None,
    })
}

fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    e(ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn ret(expr: Expr) -> Statement {
    st(StatementKind::Return(Some(expr)))
}

fn compound(items: Vec<BlockItem>) -> Statement {
    st(StatementKind::Compound(items))
}

fn stmts(statements: Vec<Statement>) -> Statement {
    compound(statements.into_iter().map(BlockItem::Statement).collect())
}

fn ident_decl(name: &str) -> Declarator {
    Declarator::Direct(DirectDeclarator::Identifier(name.to_string()))
}

fn pointer_decl(name: &str) -> Declarator {
    Declarator::Pointer(Box::new(ident_decl(name)))
}

fn param(specifiers: Vec<DeclSpecifier>, declarator: Option<Declarator>) -> ParameterDecl {
    ParameterDecl::Decl {
        specifiers,
        declarator,
    }
}

fn void_params() -> Vec<ParameterDecl> {
    vec![param(vec![named("void")], None)]
}

fn fn_decl(name: &str, params: Vec<ParameterDecl>) -> Declarator {
    Declarator::Direct(DirectDeclarator::Function {
        inner: Box::new(DirectDeclarator::Identifier(name.to_string())),
        params,
    })
}

fn function(specifiers: Vec<DeclSpecifier>, declarator: Declarator, body: Statement) -> Toplevel {
    Toplevel::FunctionDef(FunctionDef {
        specifiers,
        declarator,
        old_style_param_decls: vec![],
        body,
        span: sp(),
    })
}

fn unit(items: Vec<Toplevel>) -> TranslationUnit {
    TranslationUnit { items }
}

fn struct_def_spec(tag: &str, field_names: &[&str]) -> DeclSpecifier {
    DeclSpecifier::TypeSpecifier(TypeSpecifier::StructOrUnion(StructOrUnionSpecifier {
        is_union: false,
        tag: Some(tag.to_string()),
        fields: Some(vec![FieldDecl {
            specifiers: int_specs(),
            declarators: field_names.iter().map(|n| ident_decl(n)).collect(),
        }]),
        attribute: None,
    }))
}

fn struct_ref_spec(tag: &str) -> DeclSpecifier {
    DeclSpecifier::TypeSpecifier(TypeSpecifier::StructOrUnion(StructOrUnionSpecifier {
        is_union: false,
        tag: Some(tag.to_string()),
        fields: None,
        attribute: None,
    }))
}

fn body_of<'u>(ir: &'u TransUnit, name: &str) -> &'u IrFunction {
    ir.function_body(name)
        .unwrap_or_else(|| panic!("no body for function '{}'", name))
}

fn all_instrs(function: &IrFunction) -> Vec<&Instr> {
    function
        .layout_blocks()
        .flat_map(|b| b.instrs.iter())
        .collect()
}

fn assert_all_blocks_terminated(function: &IrFunction) {
    for block in function.layout_blocks() {
        assert!(
            block.has_terminator(),
            "block b{}.{} has no terminator",
            block.id,
            block.name
        );
    }
}

// --- Scenario 1: simple function ---------------------------------------

#[test]
fn test_simple_function() {
    // int f(int x) { return x + 1; }
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", vec![param(int_specs(), Some(ident_decl("x")))]),
        stmts(vec![ret(bin(BinaryOp::Add, ident("x"), lit(1)))]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    assert_all_blocks_terminated(f);

    // Entry: store arg0 into a local, load it, add 1, return
    let entry = f.block(f.entry());
    match &entry.instrs[..] {
        [Instr::Store { value, .. }, Instr::Load { result: loaded, ty, .. }, Instr::Binary {
            op: occ_frontend::ir::IrBinaryOp::Add,
            lhs,
            rhs,
            result: sum,
            ..
        }, Instr::Ret { value: ret_value }] => {
            assert_eq!(value.kind, ValueKind::Arg(0));
            assert_eq!(*ty, IrType::Int { bits: 32 });
            assert_eq!(lhs.kind, ValueKind::Temp(*loaded));
            assert_eq!(rhs.as_const(), Some(1));
            assert_eq!(ret_value.kind, ValueKind::Temp(*sum));
        }
        other => panic!("unexpected entry block: {:?}", other),
    }

    // The function global returns i32
    let id = ir.global_by_name("f").unwrap();
    match &ir.global(id).kind {
        occ_frontend::ir::GlobalKind::Function(sig) => {
            assert_eq!(sig.ret, IrType::Int { bits: 32 });
            assert_eq!(sig.params, vec![IrType::Int { bits: 32 }]);
        }
        _ => panic!("f is not a function"),
    }
}

// --- Scenario 2: pointer arithmetic ------------------------------------

#[test]
fn test_pointer_indexing_with_constant() {
    // int g(int *p) { return p[2]; }
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("g", vec![param(int_specs(), Some(pointer_decl("p")))]),
        stmts(vec![ret(e(ExprKind::Index {
            base: Box::new(ident("p")),
            index: Box::new(lit(2)),
        }))]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let g = body_of(&ir, "g");
    assert_all_blocks_terminated(g);

    // An indexed address with constant offset 2, then a load of i32
    let instrs = all_instrs(g);
    let field = instrs
        .iter()
        .find_map(|i| match i {
            Instr::Field { result, index, .. } => Some((*result, *index)),
            _ => None,
        })
        .expect("no field instruction");
    assert_eq!(field.1, 2);

    assert!(instrs.iter().any(|i| matches!(
        i,
        Instr::Load { ptr, ty: IrType::Int { bits: 32 }, .. }
            if ptr.kind == ValueKind::Temp(field.0)
    )));
}

// --- Scenario 3: struct return -----------------------------------------

#[test]
fn test_struct_return_abi() {
    // struct S { int a; int b; };
    // struct S h(void) { struct S s = {1, 2}; return s; }
    let struct_decl = Toplevel::Decl(Decl {
        specifiers: vec![struct_def_spec("S", &["a", "b"])],
        init_declarators: vec![],
        span: sp(),
    });

    let local_decl = BlockItem::Decl(Decl {
        specifiers: vec![struct_ref_spec("S")],
        init_declarators: vec![InitDeclarator {
            declarator: ident_decl("s"),
            init: Some(Initializer::Brace(vec![
                InitializerElement {
                    designators: vec![],
                    init: Initializer::Expr(lit(1)),
                },
                InitializerElement {
                    designators: vec![],
                    init: Initializer::Expr(lit(2)),
                },
            ])),
        }],
        span: sp(),
    });

    let ast = unit(vec![
        struct_decl,
        function(
            vec![struct_ref_spec("S")],
            fn_decl("h", void_params()),
            compound(vec![
                local_decl,
                BlockItem::Statement(ret(ident("s"))),
            ]),
        ),
    ]);

    let ir = lower_translation_unit(&ast, "test").unwrap();

    // h is declared void-returning with one implicit pointer parameter
    let id = ir.global_by_name("h").unwrap();
    match &ir.global(id).kind {
        occ_frontend::ir::GlobalKind::Function(sig) => {
            assert_eq!(sig.ret, IrType::Void);
            assert_eq!(sig.params, vec![IrType::Ptr]);
        }
        _ => panic!("h is not a function"),
    }

    let h = body_of(&ir, "h");
    assert_all_blocks_terminated(h);
    let instrs = all_instrs(h);

    // The returned struct is copied into *arg0 via memcpy, then ret void
    let memcpy_id = ir.global_by_name("memcpy").expect("memcpy declared");
    let copy = instrs
        .iter()
        .find_map(|i| match i {
            Instr::Call { callee, args, .. }
                if callee.kind == ValueKind::Global(memcpy_id)
                    && args.first().map(|a| a.kind) == Some(ValueKind::Arg(0)) =>
            {
                Some(args.clone())
            }
            _ => None,
        })
        .expect("no copy into the return slot");
    assert_eq!(copy[2].as_const(), Some(8));
    assert!(matches!(instrs.last(), Some(Instr::RetVoid)));
}

// --- Scenario 4: switch with fallthrough -------------------------------

#[test]
fn test_switch_with_fallthrough() {
    // int k(int x) { switch (x) { case 1: case 2: return 10; default: return 20; } }
    let case2 = st(StatementKind::Case {
        value: lit(2),
        body: Box::new(ret(lit(10))),
    });
    let case1 = st(StatementKind::Case {
        value: lit(1),
        body: Box::new(case2),
    });
    let default = st(StatementKind::Labeled {
        label: "default".to_string(),
        body: Box::new(ret(lit(20))),
    });
    let switch = st(StatementKind::Switch {
        value: ident("x"),
        body: Box::new(stmts(vec![case1, default])),
    });

    let ast = unit(vec![function(
        int_specs(),
        fn_decl("k", vec![param(int_specs(), Some(ident_decl("x")))]),
        stmts(vec![switch]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let k = body_of(&ir, "k");
    assert_all_blocks_terminated(k);

    // A chain of equality compares starts in the entry block
    let entry = k.block(k.entry());
    assert!(entry.instrs.iter().any(|i| matches!(
        i,
        Instr::Cmp { cmp: IrCmp::Eq, rhs, .. } if rhs.as_const() == Some(2)
    )));
    assert!(matches!(entry.instrs.last(), Some(Instr::Cond { .. })));

    let cmp_against_1 = k
        .layout_blocks()
        .flat_map(|b| b.instrs.iter())
        .any(|i| matches!(
            i,
            Instr::Cmp { cmp: IrCmp::Eq, rhs, .. } if rhs.as_const() == Some(1)
        ));
    assert!(cmp_against_1);

    // Exactly one block returns 10; case 1's block falls through to it
    let ret10_blocks: Vec<_> = k
        .layout_blocks()
        .filter(|b| {
            b.instrs
                .iter()
                .any(|i| matches!(i, Instr::Ret { value } if value.as_const() == Some(10)))
        })
        .collect();
    assert_eq!(ret10_blocks.len(), 1);
    let ret10 = ret10_blocks[0].id;

    let fallthrough = k
        .layout_blocks()
        .any(|b| b.instrs == vec![Instr::Branch { target: Some(ret10) }]);
    assert!(fallthrough, "case 1 should fall through to the return of 10");

    // And one block returns 20 for the default
    assert!(k.layout_blocks().any(|b| {
        b.instrs
            .iter()
            .any(|i| matches!(i, Instr::Ret { value } if value.as_const() == Some(20)))
    }));
}

// --- Scenario 5: short-circuit &&---------------------------------------

#[test]
fn test_short_circuit_and_phi() {
    // int m(int a, int b) { return a && b; }
    let ast = unit(vec![function(
        int_specs(),
        fn_decl(
            "m",
            vec![
                param(int_specs(), Some(ident_decl("a"))),
                param(int_specs(), Some(ident_decl("b"))),
            ],
        ),
        stmts(vec![ret(bin(BinaryOp::LogicalAnd, ident("a"), ident("b")))]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let m = body_of(&ir, "m");
    assert_all_blocks_terminated(m);

    let entry = m.entry();
    let (phi_ty, incoming) = all_instrs(m)
        .iter()
        .find_map(|i| match i {
            Instr::Phi { ty, incoming, .. } => Some((*ty, incoming.clone())),
            _ => None,
        })
        .expect("no phi");
    assert_eq!(phi_ty, IrType::Int { bits: 32 });
    assert_eq!(incoming.len(), 2);

    // The LHS-false predecessor contributes the literal 0
    let (lhs_pred, lhs_value) = incoming[0].expect("unset phi input");
    assert_eq!(lhs_pred, entry);
    assert_eq!(lhs_value.as_const(), Some(0));

    // The RHS predecessor contributes a `b != 0` compare result
    let (rhs_pred, rhs_value) = incoming[1].expect("unset phi input");
    let rhs_block = m.block(rhs_pred);
    assert!(rhs_block.instrs.iter().any(|i| matches!(
        i,
        Instr::Cmp { cmp: IrCmp::Neq, rhs, result, .. }
            if rhs.as_const() == Some(0) && rhs_value.kind == ValueKind::Temp(*result)
    )));
}

// --- Scenario 6: designated initializer --------------------------------

#[test]
fn test_designated_initializer_zero_fill() {
    // struct P { int x, y, z; } p = {.z = 7, .x = 1};
    let ast = unit(vec![Toplevel::Decl(Decl {
        specifiers: vec![struct_def_spec("P", &["x", "y", "z"])],
        init_declarators: vec![InitDeclarator {
            declarator: ident_decl("p"),
            init: Some(Initializer::Brace(vec![
                InitializerElement {
                    designators: vec![Designator::Field("z".to_string())],
                    init: Initializer::Expr(lit(7)),
                },
                InitializerElement {
                    designators: vec![Designator::Field("x".to_string())],
                    init: Initializer::Expr(lit(1)),
                },
            ])),
        }],
        span: sp(),
    })]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let id = ir.global_by_name("p").unwrap();
    match &ir.global(id).init {
        Some(IrConst::Struct { fields, .. }) => {
            let values: Vec<_> = fields.iter().map(|f| f.as_int().unwrap()).collect();
            assert_eq!(values, vec![1, 0, 7]);
        }
        other => panic!("expected a struct constant, got {:?}", other),
    }
}

// --- Further behavior ---------------------------------------------------

#[test]
fn test_sizeof_matches_ir_layout() {
    // struct S { int a; int b; }; long f(void) { return sizeof(struct S); }
    let ast = unit(vec![
        Toplevel::Decl(Decl {
            specifiers: vec![struct_def_spec("S", &["a", "b"])],
            init_declarators: vec![],
            span: sp(),
        }),
        function(
            vec![named("long")],
            fn_decl("f", void_params()),
            stmts(vec![ret(e(ExprKind::SizeofType(TypeName {
                specifiers: vec![struct_ref_spec("S")],
                declarator: None,
            })))]),
        ),
    ]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    let entry = f.block(f.entry());
    match &entry.instrs[..] {
        [Instr::Ret { value }] => assert_eq!(value.as_const(), Some(8)),
        other => panic!("unexpected entry block: {:?}", other),
    }

    // The same size the IR layout reports
    let struct_aggr = ir
        .aggregates
        .iter()
        .position(|a| a.name.as_deref() == Some("S"))
        .unwrap();
    assert_eq!(ir.size_of_ir_type(IrType::Aggregate(struct_aggr as u32)), 8);
}

#[test]
fn test_sizeof_expression_emits_nothing() {
    // int f(int x) { return sizeof(x + 1); }
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", vec![param(int_specs(), Some(ident_decl("x")))]),
        stmts(vec![ret(e(ExprKind::SizeofExpr(Box::new(bin(
            BinaryOp::Add,
            ident("x"),
            lit(1),
        )))))]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    // Only the parameter store and the return: the operand lowering went
    // to a discarded scratch function
    let entry = f.block(f.entry());
    match &entry.instrs[..] {
        [Instr::Store { .. }, Instr::Ret { value }] => {
            // sizeof(int) as unsigned long, converted to int
            assert_eq!(value.as_const(), Some(4));
        }
        other => panic!("unexpected entry block: {:?}", other),
    }
}

#[test]
fn test_enum_constants_fold() {
    // enum E { A, B = 5, C }; int f(void) { return C; }
    let ast = unit(vec![
        Toplevel::Decl(Decl {
            specifiers: vec![DeclSpecifier::TypeSpecifier(TypeSpecifier::Enum(
                EnumSpecifier {
                    tag: Some("E".to_string()),
                    enumerators: Some(vec![
                        Enumerator {
                            name: "A".to_string(),
                            value: None,
                        },
                        Enumerator {
                            name: "B".to_string(),
                            value: Some(lit(5)),
                        },
                        Enumerator {
                            name: "C".to_string(),
                            value: None,
                        },
                    ]),
                },
            ))],
            init_declarators: vec![],
            span: sp(),
        }),
        function(
            int_specs(),
            fn_decl("f", void_params()),
            stmts(vec![ret(ident("C"))]),
        ),
    ]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    let entry = f.block(f.entry());
    match &entry.instrs[..] {
        [Instr::Ret { value }] => assert_eq!(value.as_const(), Some(6)),
        other => panic!("unexpected entry block: {:?}", other),
    }
}

#[test]
fn test_string_literal_global() {
    // char *s(void) { return "hi"; }
    let ast = unit(vec![function(
        vec![named("char")],
        Declarator::Pointer(Box::new(fn_decl("s", void_params()))),
        stmts(vec![ret(e(ExprKind::StringLiteral(b"hi".to_vec())))]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let literal = ir
        .globals
        .iter()
        .find(|g| g.name.starts_with("__string_literal_"))
        .expect("no string literal global");
    assert_eq!(literal.linkage, Linkage::Local);
    match &literal.init {
        Some(IrConst::Array { elems, .. }) => {
            let bytes: Vec<_> = elems.iter().map(|e| e.as_int().unwrap()).collect();
            assert_eq!(bytes, vec![b'h' as u64, b'i' as u64, 0]);
        }
        other => panic!("expected an array constant, got {:?}", other),
    }
}

#[test]
fn test_goto_fixup_resolution() {
    // int f(void) { goto end; end: return 5; }
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", void_params()),
        stmts(vec![
            st(StatementKind::Goto("end".to_string())),
            st(StatementKind::Labeled {
                label: "end".to_string(),
                body: Box::new(ret(lit(5))),
            }),
        ]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    assert_all_blocks_terminated(f);

    // No branch is left pending
    for instr in all_instrs(f) {
        assert!(!matches!(instr, Instr::Branch { target: None }));
    }

    // The goto's branch targets the label block, which returns 5
    let label_block = f
        .layout_blocks()
        .find(|b| b.name == "end")
        .expect("no label block");
    assert!(label_block
        .instrs
        .iter()
        .any(|i| matches!(i, Instr::Ret { value } if value.as_const() == Some(5))));
    let entry = f.block(f.entry());
    assert!(matches!(
        entry.instrs.last(),
        Some(Instr::Branch { target: Some(t) }) if *t == label_block.id
    ));
}

#[test]
fn test_goto_without_label_is_an_error() {
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", void_params()),
        stmts(vec![st(StatementKind::Goto("nowhere".to_string()))]),
    )]);
    assert!(lower_translation_unit(&ast, "test").is_err());
}

#[test]
fn test_while_loop_layout() {
    // int f(int n) { while (n) { n = n - 1; } return 0; }
    let body = st(StatementKind::Expr(e(ExprKind::Assign {
        op: None,
        lhs: Box::new(ident("n")),
        rhs: Box::new(bin(BinaryOp::Sub, ident("n"), lit(1))),
    })));
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", vec![param(int_specs(), Some(ident_decl("n")))]),
        stmts(vec![
            st(StatementKind::While {
                condition: ident("n"),
                body: Box::new(stmts(vec![body])),
            }),
            ret(lit(0)),
        ]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    assert_all_blocks_terminated(f);

    // Layout: entry, ph, body, after - with `after` appended late
    let names: Vec<_> = f.layout_blocks().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "while.ph", "while.body", "while.after"]);

    // The body block loops back to the pre-header
    let ph = f.layout_blocks().find(|b| b.name == "while.ph").unwrap();
    let body_block = f.layout_blocks().find(|b| b.name == "while.body").unwrap();
    assert!(matches!(
        body_block.instrs.last(),
        Some(Instr::Branch { target: Some(t) }) if *t == ph.id
    ));
    assert!(matches!(ph.instrs.last(), Some(Instr::Cond { .. })));
}

#[test]
fn test_global_address_never_compares_equal_to_null() {
    // int x; int f(void) { return &x != 0; }
    let ast = unit(vec![
        Toplevel::Decl(Decl {
            specifiers: int_specs(),
            init_declarators: vec![InitDeclarator {
                declarator: ident_decl("x"),
                init: None,
            }],
            span: sp(),
        }),
        function(
            int_specs(),
            fn_decl("f", void_params()),
            stmts(vec![ret(bin(
                BinaryOp::NotEqual,
                e(ExprKind::Unary {
                    op: UnaryOp::AddressOf,
                    operand: Box::new(ident("x")),
                }),
                lit(0),
            ))]),
        ),
    ]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    let entry = f.block(f.entry());
    match &entry.instrs[..] {
        [Instr::Ret { value }] => assert_eq!(value.as_const(), Some(1)),
        other => panic!("unexpected entry block: {:?}", other),
    }
}

#[test]
fn test_uninitialized_global_gets_zero_and_extern_does_not() {
    let decl = |name: &str, storage: Option<StorageClass>| {
        let mut specifiers = int_specs();
        if let Some(s) = storage {
            specifiers.insert(0, DeclSpecifier::StorageClass(s));
        }
        Toplevel::Decl(Decl {
            specifiers,
            init_declarators: vec![InitDeclarator {
                declarator: ident_decl(name),
                init: None,
            }],
            span: sp(),
        })
    };
    let ast = unit(vec![
        decl("a", None),
        decl("b", Some(StorageClass::Extern)),
        decl("c", Some(StorageClass::Static)),
    ]);

    let ir = lower_translation_unit(&ast, "test").unwrap();

    let a = &ir.globals[ir.global_by_name("a").unwrap() as usize];
    assert_eq!(a.init, Some(IrConst::Int { ty: IrType::Int { bits: 32 }, value: 0 }));
    assert_eq!(a.linkage, Linkage::Global);

    let b = &ir.globals[ir.global_by_name("b").unwrap() as usize];
    assert_eq!(b.init, None);

    let c = &ir.globals[ir.global_by_name("c").unwrap() as usize];
    assert_eq!(c.linkage, Linkage::Local);
    assert!(c.init.is_some());
}

#[test]
fn test_multiple_init_declarators_in_one_global_decl() {
    // int a = 1, b = 2;
    let ast = unit(vec![Toplevel::Decl(Decl {
        specifiers: int_specs(),
        init_declarators: vec![
            InitDeclarator {
                declarator: ident_decl("a"),
                init: Some(Initializer::Expr(lit(1))),
            },
            InitDeclarator {
                declarator: ident_decl("b"),
                init: Some(Initializer::Expr(lit(2))),
            },
        ],
        span: sp(),
    })]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    for (name, expected) in [("a", 1), ("b", 2)] {
        let id = ir.global_by_name(name).unwrap();
        match &ir.global(id).init {
            Some(IrConst::Int { value, .. }) => assert_eq!(*value, expected),
            other => panic!("unexpected initializer for {}: {:?}", name, other),
        }
    }
}

#[test]
fn test_inline_function_deferred_until_extern_inline_decl() {
    // inline int f(void) { return 1; }   -- body deferred
    // extern inline int f(void);         -- body emitted here
    let inline_def = Toplevel::FunctionDef(FunctionDef {
        specifiers: vec![
            DeclSpecifier::FunctionSpecifier(FunctionSpecifier::Inline),
            named("int"),
        ],
        declarator: fn_decl("f", void_params()),
        old_style_param_decls: vec![],
        body: stmts(vec![ret(lit(1))]),
        span: sp(),
    });

    // Without the activating declaration the body is absent
    let ast = unit(vec![inline_def.clone()]);
    let ir = lower_translation_unit(&ast, "test").unwrap();
    assert!(ir.function_body("f").is_none());

    let activate = Toplevel::Decl(Decl {
        specifiers: vec![
            DeclSpecifier::StorageClass(StorageClass::Extern),
            DeclSpecifier::FunctionSpecifier(FunctionSpecifier::Inline),
            named("int"),
        ],
        init_declarators: vec![InitDeclarator {
            declarator: fn_decl("f", void_params()),
            init: None,
        }],
        span: sp(),
    });
    let ast = unit(vec![inline_def, activate]);
    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    assert!(all_instrs(f)
        .iter()
        .any(|i| matches!(i, Instr::Ret { value } if value.as_const() == Some(1))));
}

#[test]
fn test_ternary_converts_in_predecessor_blocks() {
    // long f(int c, unsigned int u, long l) { return c ? u : l; }
    let ast = unit(vec![function(
        vec![named("long")],
        fn_decl(
            "f",
            vec![
                param(int_specs(), Some(ident_decl("c"))),
                param(vec![named("unsigned"), named("int")], Some(ident_decl("u"))),
                param(vec![named("long")], Some(ident_decl("l"))),
            ],
        ),
        stmts(vec![ret(e(ExprKind::Conditional {
            condition: Box::new(ident("c")),
            then_expr: Box::new(ident("u")),
            else_expr: Box::new(ident("l")),
        }))]),
    )]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    assert_all_blocks_terminated(f);

    let (phi_ty, incoming) = all_instrs(f)
        .iter()
        .find_map(|i| match i {
            Instr::Phi { ty, incoming, .. } => Some((*ty, incoming.clone())),
            _ => None,
        })
        .expect("no phi");
    assert_eq!(phi_ty, IrType::Int { bits: 64 });

    // The unsigned operand was widened in its own predecessor block, so
    // both incoming values are 64-bit
    let (then_pred, _) = incoming[0].unwrap();
    let then_block = f.block(then_pred);
    assert!(then_block.instrs.iter().any(|i| matches!(
        i,
        Instr::Cast { op: occ_frontend::ir::CastOp::Zext, ty: IrType::Int { bits: 64 }, .. }
    )));
}

#[test]
fn test_const_and_auto_initializers_agree() {
    // The constant image of {.z = 7, .x = 1} and the store sequence of the
    // automatic path describe the same bytes
    let brace = Initializer::Brace(vec![
        InitializerElement {
            designators: vec![Designator::Field("z".to_string())],
            init: Initializer::Expr(lit(7)),
        },
        InitializerElement {
            designators: vec![Designator::Field("x".to_string())],
            init: Initializer::Expr(lit(1)),
        },
    ]);

    let struct_def = Toplevel::Decl(Decl {
        specifiers: vec![struct_def_spec("P", &["x", "y", "z"])],
        init_declarators: vec![],
        span: sp(),
    });

    // Global (constant) path
    let const_ast = unit(vec![
        struct_def.clone(),
        Toplevel::Decl(Decl {
            specifiers: vec![struct_ref_spec("P")],
            init_declarators: vec![InitDeclarator {
                declarator: ident_decl("p"),
                init: Some(brace.clone()),
            }],
            span: sp(),
        }),
    ]);
    let const_ir = lower_translation_unit(&const_ast, "test").unwrap();
    let p = const_ir.global_by_name("p").unwrap();
    let const_fields: Vec<u64> = match &const_ir.global(p).init {
        Some(IrConst::Struct { fields, .. }) => {
            fields.iter().map(|f| f.as_int().unwrap()).collect()
        }
        other => panic!("expected struct constant, got {:?}", other),
    };

    // Automatic path: zero fill plus stores at field offsets
    let auto_ast = unit(vec![
        struct_def,
        function(
            vec![named("void")],
            fn_decl("f", void_params()),
            compound(vec![BlockItem::Decl(Decl {
                specifiers: vec![struct_ref_spec("P")],
                init_declarators: vec![InitDeclarator {
                    declarator: ident_decl("q"),
                    init: Some(brace),
                }],
                span: sp(),
            })]),
        ),
    ]);
    let auto_ir = lower_translation_unit(&auto_ast, "test").unwrap();
    let f = body_of(&auto_ir, "f");
    let instrs = all_instrs(f);

    // The tree is partial, so the object is memset to zero first
    let memset = auto_ir.global_by_name("memset").unwrap();
    assert!(instrs.iter().any(|i| matches!(
        i,
        Instr::Call { callee, .. } if callee.kind == ValueKind::Global(memset)
    )));

    // Each stored (offset, value) pair matches the constant image
    let mut stored: Vec<(u64, u64)> = Vec::new();
    for instr in &instrs {
        if let Instr::Store { ptr, value } = instr {
            if let ValueKind::Temp(address) = ptr.kind {
                let offset = instrs.iter().find_map(|i| match i {
                    Instr::Binary { result, rhs, .. } if *result == address => rhs.as_const(),
                    _ => None,
                });
                if let (Some(offset), Some(v)) = (offset, value.as_const()) {
                    stored.push((offset, v));
                }
            }
        }
    }
    stored.sort_unstable();
    let expected: Vec<(u64, u64)> = const_fields
        .iter()
        .enumerate()
        .filter(|(_, &v)| v != 0)
        .map(|(i, &v)| ((i * 4) as u64, v))
        .collect();
    assert_eq!(stored, expected);
}

#[test]
fn test_errors_are_reported_not_panicked() {
    // Unknown identifier
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", void_params()),
        stmts(vec![ret(ident("nope"))]),
    )]);
    assert!(lower_translation_unit(&ast, "test").is_err());

    // break outside a loop
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", void_params()),
        stmts(vec![st(StatementKind::Break)]),
    )]);
    assert!(lower_translation_unit(&ast, "test").is_err());

    // case outside a switch
    let ast = unit(vec![function(
        int_specs(),
        fn_decl("f", void_params()),
        stmts(vec![st(StatementKind::Case {
            value: lit(1),
            body: Box::new(ret(lit(0))),
        })]),
    )]);
    assert!(lower_translation_unit(&ast, "test").is_err());

    // redefinition of a complete struct
    let ast = unit(vec![
        Toplevel::Decl(Decl {
            specifiers: vec![struct_def_spec("S", &["a"])],
            init_declarators: vec![],
            span: sp(),
        }),
        Toplevel::Decl(Decl {
            specifiers: vec![struct_def_spec("S", &["a"])],
            init_declarators: vec![],
            span: sp(),
        }),
    ]);
    assert!(lower_translation_unit(&ast, "test").is_err());
}

#[test]
fn test_function_without_return_gets_ret_void() {
    let ast = unit(vec![function(
        vec![named("void")],
        fn_decl("f", void_params()),
        stmts(vec![]),
    )]);
    let ir = lower_translation_unit(&ast, "test").unwrap();
    let f = body_of(&ir, "f");
    let entry = f.block(f.entry());
    assert_eq!(entry.instrs, vec![Instr::RetVoid]);
}

#[test]
fn test_incomplete_array_completed_by_initializer() {
    // int a[] = {1, 2, 3};
    let ast = unit(vec![Toplevel::Decl(Decl {
        specifiers: int_specs(),
        init_declarators: vec![InitDeclarator {
            declarator: Declarator::Direct(DirectDeclarator::Array {
                inner: Box::new(DirectDeclarator::Identifier("a".to_string())),
                len: None,
            }),
            init: Some(Initializer::Brace(
                [1u64, 2, 3]
                    .iter()
                    .map(|&v| InitializerElement {
                        designators: vec![],
                        init: Initializer::Expr(lit(v)),
                    })
                    .collect(),
            )),
        }],
        span: sp(),
    })]);

    let ir = lower_translation_unit(&ast, "test").unwrap();
    let a = ir.global_by_name("a").unwrap();
    match &ir.global(a).init {
        Some(IrConst::Array { elems, .. }) => {
            let values: Vec<_> = elems.iter().map(|e| e.as_int().unwrap()).collect();
            assert_eq!(values, vec![1, 2, 3]);
        }
        other => panic!("expected array constant, got {:?}", other),
    }
    match &ir.global(a).ty {
        IrType::Aggregate(id) => match &ir.aggregate(*id).kind {
            AggregateKind::Array { len, .. } => assert_eq!(*len, 3),
            other => panic!("expected array aggregate, got {:?}", other),
        },
        other => panic!("expected aggregate type, got {:?}", other),
    }
}
