//! Bytecode container format
//!
//! The VM consumes compiled modules; it never produces them. A module is
//! header (magic, version, name), a constant pool of primitive values, a
//! function table, and optional per-function debug info. Packed
//! instructions reference the pool by index; loading resolves them into
//! runtime [`Instruction`]s with inline values.

use crate::function::VMFunction;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;
use veil_types::{Instruction, Value};

/// Magic string every module starts with.
pub const MAGIC: &str = "VEIL";
/// Container version this loader understands.
pub const VERSION: u32 = 1;

/// Errors raised while loading a module.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("bad magic: expected \"VEIL\", got {0:?}")]
    BadMagic(String),

    #[error("unsupported container version {0} (expected 1)")]
    UnsupportedVersion(u32),

    #[error("constant index {index} out of range in function '{function}'")]
    ConstantOutOfRange { function: String, index: usize },

    #[error("duplicate function '{0}' in module")]
    DuplicateFunction(String),

    #[error("label '{label}' in function '{function}' points past instruction {limit}")]
    LabelOutOfRange {
        function: String,
        label: String,
        limit: usize,
    },

    #[error("malformed module: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("i/o error reading module: {0}")]
    Io(#[from] std::io::Error),
}

/// Module header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleHeader {
    pub magic: String,
    pub version: u32,
    pub name: String,
}

/// A pooled constant. Only primitive values travel in bytecode;
/// composites are built at runtime through the standard library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Constant {
    Unit,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Fixed-point float, already scaled
    Float(i64),
    Str(String),
}

impl Constant {
    fn to_value(&self) -> Value {
        match self {
            Constant::Unit => Value::Unit,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::I8(n) => Value::I8(*n),
            Constant::I16(n) => Value::I16(*n),
            Constant::I32(n) => Value::I32(*n),
            Constant::I64(n) => Value::I64(*n),
            Constant::U8(n) => Value::U8(*n),
            Constant::U16(n) => Value::U16(*n),
            Constant::U32(n) => Value::U32(*n),
            Constant::U64(n) => Value::U64(*n),
            Constant::Float(n) => Value::Float(*n),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// A packed instruction as it travels in the container. Identical to the
/// runtime instruction set except that `LDI` refers to the constant pool
/// by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PackedOp {
    LD(usize, i32),
    LDI(usize, usize),
    MOV(usize, usize),
    PUSHARG(usize),
    ADD(usize, usize, usize),
    SUB(usize, usize, usize),
    MUL(usize, usize, usize),
    DIV(usize, usize, usize),
    MOD(usize, usize, usize),
    AND(usize, usize, usize),
    OR(usize, usize, usize),
    XOR(usize, usize, usize),
    NOT(usize, usize),
    SHL(usize, usize, usize),
    SHR(usize, usize, usize),
    JMP(String),
    JMPEQ(String),
    JMPNEQ(String),
    CMP(usize, usize),
    CALL(String),
    RET(usize),
}

/// Optional per-function debug info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDebug {
    /// Source line for each instruction
    pub lines: Vec<u32>,
}

/// One function-table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub upvalues: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
    pub register_count: usize,
    pub instructions: Vec<PackedOp>,
    #[serde(default)]
    pub labels: FxHashMap<String, usize>,
    #[serde(default)]
    pub debug: Option<FunctionDebug>,
}

/// A complete bytecode module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BytecodeModule {
    pub header: ModuleHeader,
    #[serde(default)]
    pub constants: Vec<Constant>,
    pub functions: Vec<FunctionDef>,
}

impl BytecodeModule {
    /// Parse a module from its JSON encoding.
    pub fn from_json(source: &str) -> Result<Self, LoadError> {
        let module: BytecodeModule = serde_json::from_str(source)?;
        module.validate()?;
        Ok(module)
    }

    /// Parse a module from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let module: BytecodeModule = serde_json::from_reader(reader)?;
        module.validate()?;
        Ok(module)
    }

    fn validate(&self) -> Result<(), LoadError> {
        if self.header.magic != MAGIC {
            return Err(LoadError::BadMagic(self.header.magic.clone()));
        }
        if self.header.version != VERSION {
            return Err(LoadError::UnsupportedVersion(self.header.version));
        }

        let mut seen = FxHashMap::default();
        for function in &self.functions {
            if seen.insert(function.name.clone(), ()).is_some() {
                return Err(LoadError::DuplicateFunction(function.name.clone()));
            }
            for (label, target) in &function.labels {
                if *target > function.instructions.len() {
                    return Err(LoadError::LabelOutOfRange {
                        function: function.name.clone(),
                        label: label.clone(),
                        limit: function.instructions.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve pool indices and produce runtime function definitions.
    pub fn into_functions(self) -> Result<Vec<VMFunction>, LoadError> {
        self.validate()?;

        let constants = &self.constants;
        let mut functions = Vec::with_capacity(self.functions.len());

        for def in &self.functions {
            let mut instructions = Vec::with_capacity(def.instructions.len());
            for op in &def.instructions {
                instructions.push(resolve(op, constants, &def.name)?);
            }

            functions.push(VMFunction {
                name: def.name.clone(),
                parameters: def.parameters.clone(),
                upvalues: def.upvalues.clone(),
                parent: def.parent.clone(),
                register_count: def.register_count,
                instructions,
                labels: def.labels.clone(),
            });
        }

        Ok(functions)
    }
}

fn resolve(op: &PackedOp, constants: &[Constant], function: &str) -> Result<Instruction, LoadError> {
    Ok(match op {
        PackedOp::LD(dest, offset) => Instruction::LD(*dest, *offset),
        PackedOp::LDI(dest, index) => {
            let constant = constants
                .get(*index)
                .ok_or_else(|| LoadError::ConstantOutOfRange {
                    function: function.to_string(),
                    index: *index,
                })?;
            Instruction::LDI(*dest, constant.to_value())
        }
        PackedOp::MOV(dest, src) => Instruction::MOV(*dest, *src),
        PackedOp::PUSHARG(src) => Instruction::PUSHARG(*src),
        PackedOp::ADD(dest, a, b) => Instruction::ADD(*dest, *a, *b),
        PackedOp::SUB(dest, a, b) => Instruction::SUB(*dest, *a, *b),
        PackedOp::MUL(dest, a, b) => Instruction::MUL(*dest, *a, *b),
        PackedOp::DIV(dest, a, b) => Instruction::DIV(*dest, *a, *b),
        PackedOp::MOD(dest, a, b) => Instruction::MOD(*dest, *a, *b),
        PackedOp::AND(dest, a, b) => Instruction::AND(*dest, *a, *b),
        PackedOp::OR(dest, a, b) => Instruction::OR(*dest, *a, *b),
        PackedOp::XOR(dest, a, b) => Instruction::XOR(*dest, *a, *b),
        PackedOp::NOT(dest, src) => Instruction::NOT(*dest, *src),
        PackedOp::SHL(dest, src, amount) => Instruction::SHL(*dest, *src, *amount),
        PackedOp::SHR(dest, src, amount) => Instruction::SHR(*dest, *src, *amount),
        PackedOp::JMP(label) => Instruction::JMP(label.clone()),
        PackedOp::JMPEQ(label) => Instruction::JMPEQ(label.clone()),
        PackedOp::JMPNEQ(label) => Instruction::JMPNEQ(label.clone()),
        PackedOp::CMP(r1, r2) => Instruction::CMP(*r1, *r2),
        PackedOp::CALL(name) => Instruction::CALL(name.clone()),
        PackedOp::RET(reg) => Instruction::RET(*reg),
    })
}
