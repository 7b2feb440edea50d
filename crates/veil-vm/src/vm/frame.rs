//! Activation records and the frame pool

use crate::error::VmError;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use veil_types::{Upvalue, Value};

/// The complete execution context of one function call.
///
/// Invariant: `registers.len()` equals the owning function's
/// `register_count` for the whole life of the frame. Register 0 is the
/// return-value slot by convention.
#[derive(Debug, Clone)]
pub struct ActivationRecord {
    pub function_name: String,
    /// Named values, seeded from parameters at call time
    pub locals: FxHashMap<String, Value>,
    pub registers: SmallVec<[Value; 16]>,
    /// Captured values, seeded from the invoking closure
    pub upvalues: Vec<Upvalue>,
    pub instruction_pointer: usize,
    /// Argument-staging buffer, cleared on every call setup
    pub stack: SmallVec<[Value; 8]>,
    /// Result of the last `CMP` in this frame
    pub compare_flag: Ordering,
}

impl ActivationRecord {
    pub fn new(function_name: impl Into<String>, register_count: usize) -> Self {
        let mut registers = SmallVec::with_capacity(register_count);
        registers.resize(register_count, Value::Unit);

        ActivationRecord {
            function_name: function_name.into(),
            locals: FxHashMap::default(),
            registers,
            upvalues: Vec::new(),
            instruction_pointer: 0,
            stack: SmallVec::new(),
            compare_flag: Ordering::Equal,
        }
    }

    /// Reinitialize a recycled frame for a new call.
    pub fn reset_for(&mut self, function_name: &str, register_count: usize) {
        self.function_name.clear();
        self.function_name.push_str(function_name);
        self.locals.clear();
        self.registers.clear();
        self.registers.resize(register_count, Value::Unit);
        self.upvalues.clear();
        self.instruction_pointer = 0;
        self.stack.clear();
        self.compare_flag = Ordering::Equal;
    }

    #[inline]
    pub fn register(&self, index: usize) -> Result<&Value, VmError> {
        self.registers
            .get(index)
            .ok_or(VmError::InvalidRegister(index))
    }

    /// Replace a register's value, returning the previous one.
    #[inline]
    pub fn set_register(&mut self, index: usize, value: Value) -> Result<Value, VmError> {
        let slot = self
            .registers
            .get_mut(index)
            .ok_or(VmError::InvalidRegister(index))?;
        Ok(std::mem::replace(slot, value))
    }

    pub fn upvalue(&self, name: &str) -> Option<&Upvalue> {
        self.upvalues.iter().find(|upvalue| upvalue.name == name)
    }

    /// Overwrite an upvalue in this frame, returning the previous value.
    pub fn set_upvalue(&mut self, name: &str, value: Value) -> Option<Value> {
        let upvalue = self
            .upvalues
            .iter_mut()
            .find(|upvalue| upvalue.name == name)?;
        Some(std::mem::replace(&mut upvalue.value, value))
    }
}

/// Recycles popped activation records so hot call paths do not
/// reallocate register windows and maps on every call.
#[derive(Debug)]
pub struct FramePool {
    free: Vec<ActivationRecord>,
    capacity: usize,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        FramePool {
            free: Vec::new(),
            capacity,
        }
    }

    /// Get a frame initialized for the given function, reusing a popped
    /// record when one is available.
    pub fn acquire(&mut self, function_name: &str, register_count: usize) -> ActivationRecord {
        match self.free.pop() {
            Some(mut frame) => {
                frame.reset_for(function_name, register_count);
                frame
            }
            None => ActivationRecord::new(function_name, register_count),
        }
    }

    /// Return a popped frame to the pool.
    pub fn release(&mut self, frame: ActivationRecord) {
        if self.free.len() < self.capacity {
            self.free.push(frame);
        }
    }
}
