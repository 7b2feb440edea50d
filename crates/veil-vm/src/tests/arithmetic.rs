//! Arithmetic instruction tests

use crate::error::VmError;
use crate::tests::function;
use crate::vm::VirtualMachine;
use proptest::prelude::*;
use veil_types::{Instruction, Value};

fn eval_binary(
    op: fn(usize, usize, usize) -> Instruction,
    a: Value,
    b: Value,
) -> Result<Value, crate::error::Fault> {
    let vm = VirtualMachine::new();
    vm.register_function(function(
        "main",
        &[],
        3,
        vec![
            Instruction::LDI(0, a),
            Instruction::LDI(1, b),
            op(2, 0, 1),
            Instruction::RET(2),
        ],
    ));
    vm.execute("main")
}

#[test]
fn test_add() {
    let result = eval_binary(Instruction::ADD, Value::I64(2), Value::I64(3)).unwrap();
    assert_eq!(result, Value::I64(5));
}

#[test]
fn test_sub() {
    let result = eval_binary(Instruction::SUB, Value::I64(10), Value::I64(4)).unwrap();
    assert_eq!(result, Value::I64(6));
}

#[test]
fn test_mul() {
    let result = eval_binary(Instruction::MUL, Value::I64(6), Value::I64(7)).unwrap();
    assert_eq!(result, Value::I64(42));
}

#[test]
fn test_div() {
    let result = eval_binary(Instruction::DIV, Value::I64(20), Value::I64(4)).unwrap();
    assert_eq!(result, Value::I64(5));
}

#[test]
fn test_mod() {
    let result = eval_binary(Instruction::MOD, Value::I64(17), Value::I64(5)).unwrap();
    assert_eq!(result, Value::I64(2));
}

#[test]
fn test_fixed_point_multiply() {
    let result =
        eval_binary(Instruction::MUL, Value::float(1.5), Value::float(2.0)).unwrap();
    assert_eq!(result, Value::float(3.0));
}

#[test]
fn test_string_concat_on_add() {
    let result = eval_binary(
        Instruction::ADD,
        Value::Str("veil".into()),
        Value::Str("vm".into()),
    )
    .unwrap();
    assert_eq!(result, Value::Str("veilvm".into()));
}

#[test]
fn test_division_by_zero_reports_site() {
    let fault = eval_binary(Instruction::DIV, Value::I64(1), Value::I64(0)).unwrap_err();
    assert_eq!(fault.error, VmError::DivisionByZero);
    assert_eq!(fault.function, "main");
    assert_eq!(fault.instruction_pointer, 2);
}

#[test]
fn test_modulo_by_zero() {
    let fault = eval_binary(Instruction::MOD, Value::I64(1), Value::I64(0)).unwrap_err();
    assert_eq!(fault.error, VmError::DivisionByZero);
}

#[test]
fn test_mixed_width_operands_rejected() {
    let fault = eval_binary(Instruction::ADD, Value::I32(1), Value::I64(1)).unwrap_err();
    assert!(matches!(fault.error, VmError::TypeMismatch { .. }));
}

#[test]
fn test_bitwise_family() {
    assert_eq!(
        eval_binary(Instruction::AND, Value::I64(0b1100), Value::I64(0b1010)).unwrap(),
        Value::I64(0b1000)
    );
    assert_eq!(
        eval_binary(Instruction::OR, Value::I64(0b1100), Value::I64(0b1010)).unwrap(),
        Value::I64(0b1110)
    );
    assert_eq!(
        eval_binary(Instruction::XOR, Value::I64(0b1100), Value::I64(0b1010)).unwrap(),
        Value::I64(0b0110)
    );
    assert_eq!(
        eval_binary(Instruction::SHL, Value::I64(3), Value::I64(2)).unwrap(),
        Value::I64(12)
    );
    assert_eq!(
        eval_binary(Instruction::SHR, Value::I64(12), Value::I64(2)).unwrap(),
        Value::I64(3)
    );
}

#[test]
fn test_not() {
    let vm = VirtualMachine::new();
    vm.register_function(function(
        "main",
        &[],
        2,
        vec![
            Instruction::LDI(0, Value::Bool(false)),
            Instruction::NOT(1, 0),
            Instruction::RET(1),
        ],
    ));
    assert_eq!(vm.execute("main").unwrap(), Value::Bool(true));
}

proptest! {
    // ADD over i64 follows two's-complement wrapping for all inputs
    #[test]
    fn test_add_wraps_for_all_integers(a in any::<i64>(), b in any::<i64>()) {
        let result = eval_binary(Instruction::ADD, Value::I64(a), Value::I64(b)).unwrap();
        prop_assert_eq!(result, Value::I64(a.wrapping_add(b)));
    }

    // DIV by zero is always a reported error, never a crash
    #[test]
    fn test_div_by_zero_never_crashes(a in any::<i64>()) {
        let fault = eval_binary(Instruction::DIV, Value::I64(a), Value::I64(0)).unwrap_err();
        prop_assert_eq!(fault.error, VmError::DivisionByZero);
    }
}
