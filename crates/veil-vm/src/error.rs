//! Error types for the VM
//!
//! Every runtime failure is an explicit result value. Instruction-level
//! code reports a [`VmError`]; the execution loop wraps the first error in
//! a [`Fault`] carrying the function name and instruction pointer at the
//! fault site, then aborts the whole `execute()` call.

use thiserror::Error;
use veil_types::StoreError;

/// VM runtime errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// Operand kinds incompatible with the instruction
    #[error("type mismatch in {operation}: {detail}")]
    TypeMismatch {
        operation: &'static str,
        detail: String,
    },

    /// Function name not present in the registry
    #[error("function '{0}' not found")]
    UndefinedFunction(String),

    /// Jump target missing from the function's label map
    #[error("label '{0}' not found")]
    UndefinedLabel(String),

    /// Upvalue name not found in scope
    #[error("upvalue '{0}' not found")]
    UndefinedUpvalue(String),

    /// Wrong argument count on a call or closure invocation
    #[error("function '{function}' expects {expected} arguments but got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    /// Call depth exceeded the configured bound
    #[error("stack overflow: call depth exceeded {0}")]
    StackOverflow(usize),

    #[error("division by zero")]
    DivisionByZero,

    /// Stale or out-of-range object/array/foreign handle
    #[error("invalid {kind} handle: {handle}")]
    InvalidHandle { kind: &'static str, handle: usize },

    /// A hook callback signaled failure
    #[error("hook aborted execution: {0}")]
    HookAborted(String),

    /// Register index outside the frame's register window
    #[error("invalid register: r{0}")]
    InvalidRegister(usize),

    /// Internal inconsistency in the executed bytecode
    #[error("corrupt bytecode: {0}")]
    CorruptBytecode(String),
}

impl From<StoreError> for VmError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::MissingObject(handle) => VmError::InvalidHandle {
                kind: "object",
                handle,
            },
            StoreError::MissingArray(handle) => VmError::InvalidHandle {
                kind: "array",
                handle,
            },
            StoreError::NotComposite(got) => VmError::TypeMismatch {
                operation: "field access",
                detail: format!("expected object or array, got {}", got),
            },
        }
    }
}

/// Terminal error returned by `execute()`: the failing [`VmError`] plus
/// the function and instruction pointer where execution stopped.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} (in '{function}' at instruction {instruction_pointer})")]
pub struct Fault {
    pub error: VmError,
    pub function: String,
    pub instruction_pointer: usize,
}

impl Fault {
    pub fn new(error: VmError, function: impl Into<String>, instruction_pointer: usize) -> Self {
        Fault {
            error,
            function: function.into(),
            instruction_pointer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_carries_site() {
        let fault = Fault::new(VmError::DivisionByZero, "main", 7);
        assert_eq!(
            fault.to_string(),
            "division by zero (in 'main' at instruction 7)"
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let error: VmError = StoreError::MissingObject(3).into();
        assert_eq!(
            error,
            VmError::InvalidHandle {
                kind: "object",
                handle: 3
            }
        );
    }
}
