//! Secret-domain semantics: delegation, domain separation, reveal

use crate::error::VmError;
use crate::protocol;
use crate::tests::function;
use crate::vm::VirtualMachine;
use parking_lot::Mutex;
use std::sync::Arc;
use veil_types::{Instruction, ShareType, Value};

fn share(n: i64) -> Value {
    Value::Share(ShareType::Int(64), n.to_le_bytes().to_vec())
}

fn decode(bytes: &[u8]) -> i64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&bytes[0..8]);
    i64::from_le_bytes(buffer)
}

/// Test double for the protocol layer: "shares" are just little-endian
/// plaintext, which is enough to observe the delegation contract.
fn install_stub_protocol(vm: &VirtualMachine, calls: Arc<Mutex<Vec<&'static str>>>) {
    let log = Arc::clone(&calls);
    vm.register_foreign_function(protocol::ADD, move |context| {
        context.expect_args(protocol::ADD, 2)?;
        log.lock().push(protocol::ADD);
        match (&context.args[0], &context.args[1]) {
            (Value::Share(ty, a), Value::Share(_, b)) => {
                let sum = decode(a).wrapping_add(decode(b));
                Ok(Value::Share(ty.clone(), sum.to_le_bytes().to_vec()))
            }
            _ => Err(VmError::TypeMismatch {
                operation: "mpc_add",
                detail: "expected two shares".to_string(),
            }),
        }
    });

    let log = Arc::clone(&calls);
    vm.register_foreign_function(protocol::MUL, move |context| {
        context.expect_args(protocol::MUL, 2)?;
        log.lock().push(protocol::MUL);
        match (&context.args[0], &context.args[1]) {
            (Value::Share(ty, a), Value::Share(_, b)) => {
                let product = decode(a).wrapping_mul(decode(b));
                Ok(Value::Share(ty.clone(), product.to_le_bytes().to_vec()))
            }
            _ => Err(VmError::TypeMismatch {
                operation: "mpc_mul",
                detail: "expected two shares".to_string(),
            }),
        }
    });

    let log = Arc::clone(&calls);
    vm.register_foreign_function(protocol::REVEAL, move |context| {
        context.expect_args(protocol::REVEAL, 1)?;
        log.lock().push(protocol::REVEAL);
        match &context.args[0] {
            Value::Share(_, bytes) => Ok(Value::I64(decode(bytes))),
            other => Err(VmError::TypeMismatch {
                operation: "mpc_reveal",
                detail: format!("expected share, got {}", other.type_name()),
            }),
        }
    });
}

#[test]
fn test_share_addition_delegates_to_protocol() {
    let vm = VirtualMachine::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    install_stub_protocol(&vm, Arc::clone(&calls));

    vm.register_function(function(
        "main",
        &[],
        3,
        vec![
            Instruction::LDI(0, share(2)),
            Instruction::LDI(1, share(3)),
            Instruction::ADD(2, 0, 1),
            Instruction::RET(2),
        ],
    ));

    let result = vm.execute("main").unwrap();
    match result {
        Value::Share(ShareType::Int(64), bytes) => assert_eq!(decode(&bytes), 5),
        other => panic!("expected a share result, got {:?}", other),
    }
    assert_eq!(*calls.lock(), vec![protocol::ADD]);
}

#[test]
fn test_share_multiplication_delegates_to_protocol() {
    let vm = VirtualMachine::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    install_stub_protocol(&vm, Arc::clone(&calls));

    vm.register_function(function(
        "main",
        &[],
        3,
        vec![
            Instruction::LDI(0, share(6)),
            Instruction::LDI(1, share(7)),
            Instruction::MUL(2, 0, 1),
            Instruction::RET(2),
        ],
    ));

    let result = vm.execute("main").unwrap();
    match result {
        Value::Share(_, bytes) => assert_eq!(decode(&bytes), 42),
        other => panic!("expected a share result, got {:?}", other),
    }
}

#[test]
fn test_mixed_domain_operands_are_rejected() {
    let vm = VirtualMachine::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    install_stub_protocol(&vm, Arc::clone(&calls));

    vm.register_function(function(
        "main",
        &[],
        3,
        vec![
            Instruction::LDI(0, share(2)),
            Instruction::LDI(1, Value::I64(3)),
            Instruction::ADD(2, 0, 1),
            Instruction::RET(2),
        ],
    ));

    let fault = vm.execute("main").unwrap_err();
    assert!(matches!(fault.error, VmError::TypeMismatch { .. }));
    // The protocol layer was never consulted
    assert!(calls.lock().is_empty());
}

#[test]
fn test_share_arithmetic_without_protocol_is_undefined_function() {
    let vm = VirtualMachine::new();
    vm.register_function(function(
        "main",
        &[],
        3,
        vec![
            Instruction::LDI(0, share(1)),
            Instruction::LDI(1, share(1)),
            Instruction::ADD(2, 0, 1),
            Instruction::RET(2),
        ],
    ));

    let fault = vm.execute("main").unwrap_err();
    assert_eq!(
        fault.error,
        VmError::UndefinedFunction(protocol::ADD.to_string())
    );
}

#[test]
fn test_mov_never_converts_domains() {
    let vm = VirtualMachine::new();
    vm.register_function(function(
        "main",
        &[],
        2,
        vec![
            Instruction::LDI(0, share(11)),
            Instruction::MOV(1, 0),
            Instruction::RET(1),
        ],
    ));

    // A moved share is still a share; there is no implicit reveal
    match vm.execute("main").unwrap() {
        Value::Share(ShareType::Int(64), bytes) => assert_eq!(decode(&bytes), 11),
        other => panic!("expected a share, got {:?}", other),
    }
}

#[test]
fn test_explicit_reveal_through_foreign_call() {
    let vm = VirtualMachine::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    install_stub_protocol(&vm, Arc::clone(&calls));

    vm.register_function(function(
        "main",
        &[],
        1,
        vec![
            Instruction::LDI(0, share(9)),
            Instruction::PUSHARG(0),
            Instruction::CALL(protocol::REVEAL.to_string()),
            Instruction::RET(0),
        ],
    ));

    assert_eq!(vm.execute("main").unwrap(), Value::I64(9));
    assert_eq!(*calls.lock(), vec![protocol::REVEAL]);
}

#[test]
fn test_cmp_on_shares_is_rejected() {
    let vm = VirtualMachine::new();
    vm.register_function(function(
        "main",
        &[],
        2,
        vec![
            Instruction::LDI(0, share(1)),
            Instruction::LDI(1, share(2)),
            Instruction::CMP(0, 1),
            Instruction::RET(0),
        ],
    ));

    let fault = vm.execute("main").unwrap_err();
    assert!(matches!(fault.error, VmError::TypeMismatch { .. }));
}

#[test]
fn test_secret_shift_amount_is_rejected() {
    let vm = VirtualMachine::new();
    vm.register_function(function(
        "main",
        &[],
        3,
        vec![
            Instruction::LDI(0, share(4)),
            Instruction::LDI(1, share(1)),
            Instruction::SHL(2, 0, 1),
            Instruction::RET(2),
        ],
    ));

    let fault = vm.execute("main").unwrap_err();
    assert!(matches!(fault.error, VmError::TypeMismatch { .. }));
}
