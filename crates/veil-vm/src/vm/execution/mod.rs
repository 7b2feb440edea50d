//! Instruction handlers, grouped by family
//!
//! `step` is the decode stage of the loop in [`super::VMState`]: it
//! dispatches one instruction to its handler and reports whether
//! execution continues or the program completed.

mod arithmetic;
mod bitwise;
mod control;
mod memory;

use crate::error::VmError;
use crate::function::VMFunction;
use crate::vm::result::Flow;
use crate::vm::VMState;
use std::sync::Arc;
use veil_types::{Instruction, Value};

impl VMState {
    pub(crate) fn step(
        &mut self,
        instruction: &Instruction,
        function: &Arc<VMFunction>,
    ) -> Result<Flow, VmError> {
        match instruction {
            Instruction::LD(dest, offset) => self.exec_ld(*dest, *offset)?,
            Instruction::LDI(dest, value) => self.exec_ldi(*dest, value)?,
            Instruction::MOV(dest, src) => self.exec_mov(*dest, *src)?,
            Instruction::PUSHARG(src) => self.exec_pusharg(*src)?,

            Instruction::ADD(dest, a, b) => self.exec_add(*dest, *a, *b)?,
            Instruction::SUB(dest, a, b) => self.exec_sub(*dest, *a, *b)?,
            Instruction::MUL(dest, a, b) => self.exec_mul(*dest, *a, *b)?,
            Instruction::DIV(dest, a, b) => self.exec_div(*dest, *a, *b)?,
            Instruction::MOD(dest, a, b) => self.exec_mod(*dest, *a, *b)?,

            Instruction::AND(dest, a, b) => self.exec_and(*dest, *a, *b)?,
            Instruction::OR(dest, a, b) => self.exec_or(*dest, *a, *b)?,
            Instruction::XOR(dest, a, b) => self.exec_xor(*dest, *a, *b)?,
            Instruction::NOT(dest, src) => self.exec_not(*dest, *src)?,
            Instruction::SHL(dest, src, amount) => self.exec_shl(*dest, *src, *amount)?,
            Instruction::SHR(dest, src, amount) => self.exec_shr(*dest, *src, *amount)?,

            Instruction::JMP(label) => self.exec_jmp(function, label)?,
            Instruction::JMPEQ(label) => self.exec_jmpeq(function, label)?,
            Instruction::JMPNEQ(label) => self.exec_jmpneq(function, label)?,
            Instruction::CMP(r1, r2) => self.exec_cmp(*r1, *r2)?,
            Instruction::CALL(name) => self.exec_call(name)?,
            Instruction::RET(reg) => return self.exec_ret(*reg),
        }
        Ok(Flow::Continue)
    }

    /// Snapshot two operand registers of the current frame.
    pub(crate) fn binary_operands(&self, a: usize, b: usize) -> Result<(Value, Value), VmError> {
        let frame = self.current_frame()?;
        Ok((frame.register(a)?.clone(), frame.register(b)?.clone()))
    }
}
