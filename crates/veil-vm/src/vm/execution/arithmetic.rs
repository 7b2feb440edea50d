//! Arithmetic instructions: ADD, SUB, MUL, DIV, MOD
//!
//! Clear operands are computed natively (see [`crate::vm::ops`]). When
//! both operands are `Share` values the instruction delegates to the
//! protocol-registered foreign function for that operation; the VM
//! never does arithmetic on share bytes itself. One clear and one secret
//! operand is a domain violation and reported as a type mismatch.

use crate::error::VmError;
use crate::protocol;
use crate::vm::{ops, VMState};
use veil_types::Value;

fn mixed_domain(operation: &'static str) -> VmError {
    VmError::TypeMismatch {
        operation,
        detail: "secret and clear operands cannot mix; share or reveal explicitly".to_string(),
    }
}

impl VMState {
    /// Shared shape of every two-operand arithmetic/bitwise instruction.
    pub(crate) fn exec_binary(
        &mut self,
        operation: &'static str,
        protocol_name: &str,
        clear: fn(&Value, &Value) -> Result<Value, VmError>,
        dest: usize,
        a: usize,
        b: usize,
    ) -> Result<(), VmError> {
        let (lhs, rhs) = self.binary_operands(a, b)?;

        let result = match (lhs.is_share(), rhs.is_share()) {
            (false, false) => clear(&lhs, &rhs)?,
            (true, true) => self.call_foreign_function(protocol_name, &[lhs, rhs])?,
            _ => return Err(mixed_domain(operation)),
        };

        self.write_register(dest, result)
    }

    pub(crate) fn exec_add(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("ADD", protocol::ADD, ops::add, dest, a, b)
    }

    pub(crate) fn exec_sub(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("SUB", protocol::SUB, ops::sub, dest, a, b)
    }

    pub(crate) fn exec_mul(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("MUL", protocol::MUL, ops::mul, dest, a, b)
    }

    pub(crate) fn exec_div(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("DIV", protocol::DIV, ops::div, dest, a, b)
    }

    pub(crate) fn exec_mod(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("MOD", protocol::MOD, ops::modulo, dest, a, b)
    }
}
