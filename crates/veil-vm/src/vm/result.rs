//! Execution result types

use veil_types::Value;

/// Outcome of a single dispatched instruction.
#[derive(Debug)]
pub(crate) enum Flow {
    /// Continue with the next instruction
    Continue,
    /// A `RET` popped the last frame; the program is complete
    Return(Value),
}
