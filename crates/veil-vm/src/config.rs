//! VM configuration
//!
//! Runtime limits only; enforcement happens in the execution engine.

/// Default maximum call depth.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// VM configuration.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum call depth (recursion limit). Exceeding it is a reported
    /// `StackOverflow`, never a host stack fault.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
