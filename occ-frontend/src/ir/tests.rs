//! IR unit tests

use super::*;
use occ_common::BlockId;

#[test]
fn test_block_terminator_detection() {
    let mut function = IrFunction::new();
    let entry = function.entry();
    assert!(!function.block(entry).has_terminator());

    function.block_mut(entry).instrs.push(Instr::RetVoid);
    assert!(function.block(entry).has_terminator());
}

#[test]
fn test_reserved_blocks_are_laid_out_late() {
    let mut function = IrFunction::new();
    let ph = function.add_block("while.ph");
    let after = function.reserve_block("while.after");
    let body = function.add_block("while.body");
    function.append_block(after);

    let order: Vec<BlockId> = function.layout.clone();
    assert_eq!(order, vec![function.entry(), ph, body, after]);
    assert_eq!(function.block(after).name, "while.after");
}

#[test]
fn test_builder_phi_set_param() {
    let mut builder = IrBuilder::new("test");
    builder.start_function();
    let lhs_block = builder.add_block("lhs").unwrap();
    let rhs_block = builder.add_block("rhs").unwrap();
    let join = builder.add_block("join").unwrap();
    builder.set_current_block(join);

    let ty = IrType::Int { bits: 32 };
    let phi = builder.build_phi(ty, 2).unwrap();
    builder
        .phi_set_param(phi, 0, lhs_block, Value::const_int(ty, 0))
        .unwrap();
    builder
        .phi_set_param(phi, 1, rhs_block, Value::const_int(ty, 1))
        .unwrap();

    let function = builder.finish_function().unwrap();
    match &function.block(join).instrs[0] {
        Instr::Phi { incoming, .. } => {
            assert_eq!(incoming[0], Some((lhs_block, Value::const_int(ty, 0))));
            assert_eq!(incoming[1], Some((rhs_block, Value::const_int(ty, 1))));
        }
        other => panic!("expected phi, got {}", other),
    }
}

#[test]
fn test_trans_unit_global_dedupe() {
    let mut unit = TransUnit::new("test");
    let sig = FunctionSig {
        ret: IrType::Int { bits: 32 },
        params: vec![],
        variadic: false,
    };
    let a = unit.add_function("f", sig.clone());
    let b = unit.add_function("f", sig);
    assert_eq!(a, b);

    let x = unit.add_var("x", IrType::Int { bits: 32 });
    let y = unit.add_var("x", IrType::Int { bits: 32 });
    assert_eq!(x, y);
    assert_eq!(unit.globals.len(), 2);
}

#[test]
fn test_aggregate_sizes() {
    let mut unit = TransUnit::new("test");

    let array = unit.add_array_type(IrType::Int { bits: 16 });
    assert_eq!(unit.size_of_ir_type(IrType::Aggregate(array)), 0);
    unit.set_array_type_length(array, 12);
    assert_eq!(unit.size_of_ir_type(IrType::Aggregate(array)), 24);
    assert_eq!(unit.align_of_ir_type(IrType::Aggregate(array)), 2);

    let strukt = unit.add_struct_type(Some("pair"), 2);
    match &mut unit.aggregate_mut(strukt).kind {
        AggregateKind::Struct {
            fields,
            total_size,
            alignment,
        } => {
            fields[0] = AggrField {
                ty: IrType::Int { bits: 8 },
                offset: 0,
            };
            fields[1] = AggrField {
                ty: IrType::Int { bits: 32 },
                offset: 4,
            };
            *total_size = 8;
            *alignment = 4;
        }
        _ => unreachable!(),
    }
    assert_eq!(unit.size_of_ir_type(IrType::Aggregate(strukt)), 8);
    assert_eq!(unit.align_of_ir_type(IrType::Aggregate(strukt)), 4);
}

#[test]
fn test_unreachable_instructions_are_dropped() {
    let mut builder = IrBuilder::new("test");
    builder.start_function();
    builder.build_ret_void().unwrap();
    let ty = IrType::Int { bits: 32 };
    let loaded = builder.build_load(Value::local(0), ty);
    assert!(loaded.is_ok());
    let function = builder.finish_function().unwrap();
    let entry = function.entry();
    assert_eq!(function.block(entry).instrs.len(), 1);
    assert!(function.block(entry).has_terminator());
}
