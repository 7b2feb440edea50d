//! Instruction set
//!
//! Destination-first, register-addressed instructions. Jump targets are
//! symbolic labels resolved through the owning function's label map at
//! jump time. `CALL` stages its arguments through the activation record's
//! argument buffer (`PUSHARG`), not through registers.

use crate::value::Value;
use std::fmt;

/// A single VM instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Load from the argument-staging stack: `R[dest] = stack[sp + offset - 1]`
    LD(usize, i32),
    /// Load immediate: `R[dest] = value`
    LDI(usize, Value),
    /// Copy register: `R[dest] = R[src]`
    MOV(usize, usize),
    /// Push `R[src]` onto the argument-staging stack
    PUSHARG(usize),

    /// `R[dest] = R[src1] + R[src2]`
    ADD(usize, usize, usize),
    /// `R[dest] = R[src1] - R[src2]`
    SUB(usize, usize, usize),
    /// `R[dest] = R[src1] * R[src2]`
    MUL(usize, usize, usize),
    /// `R[dest] = R[src1] / R[src2]`
    DIV(usize, usize, usize),
    /// `R[dest] = R[src1] % R[src2]`
    MOD(usize, usize, usize),

    /// `R[dest] = R[src1] & R[src2]`
    AND(usize, usize, usize),
    /// `R[dest] = R[src1] | R[src2]`
    OR(usize, usize, usize),
    /// `R[dest] = R[src1] ^ R[src2]`
    XOR(usize, usize, usize),
    /// `R[dest] = !R[src]`
    NOT(usize, usize),
    /// `R[dest] = R[src] << R[amount]`
    SHL(usize, usize, usize),
    /// `R[dest] = R[src] >> R[amount]`
    SHR(usize, usize, usize),

    /// Unconditional jump to a label
    JMP(String),
    /// Jump if the compare flag is "equal"
    JMPEQ(String),
    /// Jump if the compare flag is not "equal"
    JMPNEQ(String),
    /// Three-way compare `R[r1]` with `R[r2]`, setting the compare flag
    CMP(usize, usize),
    /// Call a function by name; arguments come from the staging stack
    CALL(String),
    /// Return `R[reg]` to the caller's register 0
    RET(usize),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::LD(dest, offset) => write!(f, "LD r{}, sp{:+}", dest, offset),
            Instruction::LDI(dest, value) => write!(f, "LDI r{}, {}", dest, value),
            Instruction::MOV(dest, src) => write!(f, "MOV r{}, r{}", dest, src),
            Instruction::PUSHARG(src) => write!(f, "PUSHARG r{}", src),
            Instruction::ADD(dest, a, b) => write!(f, "ADD r{}, r{}, r{}", dest, a, b),
            Instruction::SUB(dest, a, b) => write!(f, "SUB r{}, r{}, r{}", dest, a, b),
            Instruction::MUL(dest, a, b) => write!(f, "MUL r{}, r{}, r{}", dest, a, b),
            Instruction::DIV(dest, a, b) => write!(f, "DIV r{}, r{}, r{}", dest, a, b),
            Instruction::MOD(dest, a, b) => write!(f, "MOD r{}, r{}, r{}", dest, a, b),
            Instruction::AND(dest, a, b) => write!(f, "AND r{}, r{}, r{}", dest, a, b),
            Instruction::OR(dest, a, b) => write!(f, "OR r{}, r{}, r{}", dest, a, b),
            Instruction::XOR(dest, a, b) => write!(f, "XOR r{}, r{}, r{}", dest, a, b),
            Instruction::NOT(dest, src) => write!(f, "NOT r{}, r{}", dest, src),
            Instruction::SHL(dest, src, amount) => write!(f, "SHL r{}, r{}, r{}", dest, src, amount),
            Instruction::SHR(dest, src, amount) => write!(f, "SHR r{}, r{}, r{}", dest, src, amount),
            Instruction::JMP(label) => write!(f, "JMP {}", label),
            Instruction::JMPEQ(label) => write!(f, "JMPEQ {}", label),
            Instruction::JMPNEQ(label) => write!(f, "JMPNEQ {}", label),
            Instruction::CMP(r1, r2) => write!(f, "CMP r{}, r{}", r1, r2),
            Instruction::CALL(name) => write!(f, "CALL {}", name),
            Instruction::RET(reg) => write!(f, "RET r{}", reg),
        }
    }
}
