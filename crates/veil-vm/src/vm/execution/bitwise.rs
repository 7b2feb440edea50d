//! Bitwise instructions: AND, OR, XOR, NOT, SHL, SHR
//!
//! Same domain rule as arithmetic: share×share delegates to the
//! protocol layer, clear×clear computes natively, mixed operands are
//! rejected. Shifts are the one asymmetric case: the shift amount must
//! always be clear, even when the shifted value is secret.

use crate::error::VmError;
use crate::protocol;
use crate::vm::{ops, VMState};
use veil_types::Value;

impl VMState {
    pub(crate) fn exec_and(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("AND", protocol::AND, ops::bit_and, dest, a, b)
    }

    pub(crate) fn exec_or(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("OR", protocol::OR, ops::bit_or, dest, a, b)
    }

    pub(crate) fn exec_xor(&mut self, dest: usize, a: usize, b: usize) -> Result<(), VmError> {
        self.exec_binary("XOR", protocol::XOR, ops::bit_xor, dest, a, b)
    }

    pub(crate) fn exec_not(&mut self, dest: usize, src: usize) -> Result<(), VmError> {
        let value = self.current_frame()?.register(src)?.clone();

        let result = if value.is_share() {
            self.call_foreign_function(protocol::NOT, &[value])?
        } else {
            ops::bit_not(&value)?
        };

        self.write_register(dest, result)
    }

    pub(crate) fn exec_shl(
        &mut self,
        dest: usize,
        src: usize,
        amount: usize,
    ) -> Result<(), VmError> {
        self.exec_shift("SHL", protocol::SHL, ops::shl, dest, src, amount)
    }

    pub(crate) fn exec_shr(
        &mut self,
        dest: usize,
        src: usize,
        amount: usize,
    ) -> Result<(), VmError> {
        self.exec_shift("SHR", protocol::SHR, ops::shr, dest, src, amount)
    }

    fn exec_shift(
        &mut self,
        operation: &'static str,
        protocol_name: &str,
        clear: fn(&Value, &Value) -> Result<Value, VmError>,
        dest: usize,
        src: usize,
        amount: usize,
    ) -> Result<(), VmError> {
        let (value, shift) = self.binary_operands(src, amount)?;

        // The amount must be clear: a secret shift width would leak
        // through timing and has no protocol counterpart
        if shift.is_share() {
            return Err(VmError::TypeMismatch {
                operation,
                detail: "shift amount must be a clear value".to_string(),
            });
        }

        let result = if value.is_share() {
            self.call_foreign_function(protocol_name, &[value, shift])?
        } else {
            clear(&value, &shift)?
        };

        self.write_register(dest, result)
    }
}
