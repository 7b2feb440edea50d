//! Foreign function bridge
//!
//! Natively-implemented functions run under the same calling convention
//! as interpreted ones but execute in place on the caller's frame: no new
//! activation record is pushed, and the call stack must be structurally
//! unchanged when they return, on both success and error paths. The one
//! sanctioned exception is a foreign function that explicitly enters a VM
//! function (the `call_closure` builtin), which pushes the callee frame
//! and lets the dispatch loop continue into it.

use crate::error::VmError;
use crate::vm::VMState;
use std::sync::Arc;
use veil_types::Value;

/// Signature of a native implementation.
pub type ForeignFn =
    Arc<dyn Fn(ForeignFunctionContext<'_>) -> Result<Value, VmError> + Send + Sync>;

/// A named native function.
#[derive(Clone)]
pub struct ForeignFunction {
    pub name: String,
    pub func: ForeignFn,
}

impl std::fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<foreign function {}>", self.name)
    }
}

/// Execution context handed to a foreign implementation: the staged
/// arguments and full mutable access to VM state.
pub struct ForeignFunctionContext<'a> {
    pub args: &'a [Value],
    pub vm_state: &'a mut VMState,
}

impl<'a> ForeignFunctionContext<'a> {
    /// Check the exact argument count, reporting an `ArityMismatch` in
    /// the named function's terms.
    pub fn expect_args(&self, function: &str, expected: usize) -> Result<(), VmError> {
        if self.args.len() != expected {
            return Err(VmError::ArityMismatch {
                function: function.to_string(),
                expected,
                got: self.args.len(),
            });
        }
        Ok(())
    }

    /// Check a minimum argument count for variadic builtins.
    pub fn expect_at_least(&self, function: &str, expected: usize) -> Result<(), VmError> {
        if self.args.len() < expected {
            return Err(VmError::ArityMismatch {
                function: function.to_string(),
                expected,
                got: self.args.len(),
            });
        }
        Ok(())
    }
}
