//! Hook system for debugging and instrumentation
//!
//! Hooks give external tooling (debuggers, tracers, the MPC protocol
//! layer) read-only visibility into every state transition the VM makes.
//! A hook is a predicate over events plus a callback; matching callbacks
//! run in descending priority order, and the first callback error aborts
//! the instruction being executed.
//!
//! Callbacks receive a [`HookContext`] with read accessors only; there
//! is no mutation path back into the VM, preserving the single-writer
//! invariant.

use crate::error::VmError;
use crate::vm::frame::ActivationRecord;
use std::cmp::Ordering;
use veil_types::{Instruction, Upvalue, Value};

/// Execution events observable through hooks.
///
/// Mutation events carry `(old, new)` value pairs; read events carry the
/// value read.
#[derive(Debug, Clone)]
pub enum HookEvent {
    BeforeInstructionExecute(Instruction),
    AfterInstructionExecute(Instruction),
    RegisterRead(usize, Value),
    RegisterWrite(usize, Value, Value),
    LocalRead(String, Value),
    LocalWrite(String, Value, Value),
    UpvalueRead(String, Value),
    UpvalueWrite(String, Value, Value),
    ObjectFieldRead(usize, Value, Value),
    ObjectFieldWrite(usize, Value, Value, Value),
    ArrayElementRead(usize, Value, Value),
    ArrayElementWrite(usize, Value, Value, Value),
    /// Callee value and staged arguments
    BeforeFunctionCall(Value, Vec<Value>),
    /// Callee value and returned result
    AfterFunctionCall(Value, Value),
    ClosureCreated(String, Vec<Upvalue>),
    StackPush(Value),
    StackPop(Value),
}

/// Decides whether a hook fires for an event.
pub type HookPredicate = dyn Fn(&HookEvent) -> bool + Send + Sync;

/// Runs when a hook fires. An `Err` aborts the current instruction and
/// surfaces to the caller of `execute()` as `HookAborted`.
pub type HookCallback = dyn Fn(&HookEvent, &HookContext<'_>) -> Result<(), String> + Send + Sync;

/// A registered hook.
pub struct Hook {
    pub id: usize,
    pub predicate: Box<HookPredicate>,
    pub callback: Box<HookCallback>,
    pub enabled: bool,
    pub priority: i32,
}

/// Read-only snapshot of the VM handed to hook callbacks.
pub struct HookContext<'a> {
    frames: &'a [ActivationRecord],
    current_instruction: usize,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(frames: &'a [ActivationRecord], current_instruction: usize) -> Self {
        HookContext {
            frames,
            current_instruction,
        }
    }

    /// Number of live activation records.
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Index of the instruction being executed.
    pub fn instruction_pointer(&self) -> usize {
        self.current_instruction
    }

    /// Name of the currently executing function.
    pub fn function_name(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.function_name.as_str())
    }

    /// Value of a register in the current frame.
    pub fn register(&self, index: usize) -> Option<&Value> {
        self.frames.last().and_then(|frame| frame.registers.get(index))
    }

    /// Compare flag of the current frame.
    pub fn compare_flag(&self) -> Option<Ordering> {
        self.frames.last().map(|frame| frame.compare_flag)
    }

    /// A local variable of the current frame.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.frames.last().and_then(|frame| frame.locals.get(name))
    }

    /// An upvalue of the current frame.
    pub fn upvalue(&self, name: &str) -> Option<&Value> {
        self.frames.last().and_then(|frame| {
            frame
                .upvalues
                .iter()
                .find(|upvalue| upvalue.name == name)
                .map(|upvalue| &upvalue.value)
        })
    }
}

/// Registry of hooks, triggered by the instruction processor at defined
/// points.
pub struct HookManager {
    hooks: Vec<Hook>,
    next_hook_id: usize,
}

impl HookManager {
    pub fn new() -> Self {
        HookManager {
            hooks: Vec::new(),
            next_hook_id: 1,
        }
    }

    /// Fast path guard: lets the VM skip old-value clones when nobody is
    /// listening.
    #[inline]
    pub fn has_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    /// Register a hook and return its id. Hooks are kept sorted by
    /// descending priority.
    pub fn register_hook(
        &mut self,
        predicate: Box<HookPredicate>,
        callback: Box<HookCallback>,
        priority: i32,
    ) -> usize {
        let id = self.next_hook_id;
        self.next_hook_id += 1;

        self.hooks.push(Hook {
            id,
            predicate,
            callback,
            enabled: true,
            priority,
        });
        self.hooks.sort_by(|a, b| b.priority.cmp(&a.priority));

        id
    }

    /// Remove a hook. Returns false if the id was unknown.
    pub fn unregister_hook(&mut self, hook_id: usize) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|hook| hook.id != hook_id);
        before != self.hooks.len()
    }

    pub fn enable_hook(&mut self, hook_id: usize) -> bool {
        self.set_enabled(hook_id, true)
    }

    pub fn disable_hook(&mut self, hook_id: usize) -> bool {
        self.set_enabled(hook_id, false)
    }

    fn set_enabled(&mut self, hook_id: usize, enabled: bool) -> bool {
        if let Some(hook) = self.hooks.iter_mut().find(|hook| hook.id == hook_id) {
            hook.enabled = enabled;
            return true;
        }
        false
    }

    /// Run every enabled hook whose predicate matches, in descending
    /// priority order. Short-circuits on the first callback error.
    pub fn trigger(&self, event: &HookEvent, context: &HookContext<'_>) -> Result<(), VmError> {
        for hook in &self.hooks {
            if hook.enabled && (hook.predicate)(event) {
                (hook.callback)(event, context).map_err(VmError::HookAborted)?;
            }
        }
        Ok(())
    }
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn trigger_simple(manager: &HookManager, event: &HookEvent) -> Result<(), VmError> {
        let frames: Vec<ActivationRecord> = Vec::new();
        let context = HookContext::new(&frames, 0);
        manager.trigger(event, &context)
    }

    #[test]
    fn test_priority_order() {
        let mut manager = HookManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, priority) in [("low", 1), ("high", 100), ("mid", 50)] {
            let order = Arc::clone(&order);
            manager.register_hook(
                Box::new(|_| true),
                Box::new(move |_, _| {
                    order.lock().push(label);
                    Ok(())
                }),
                priority,
            );
        }

        trigger_simple(&manager, &HookEvent::StackPush(Value::Unit)).unwrap();
        assert_eq!(*order.lock(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_disabled_hooks_do_not_fire() {
        let mut manager = HookManager::new();
        let fired = Arc::new(Mutex::new(0u32));

        let counter = Arc::clone(&fired);
        let id = manager.register_hook(
            Box::new(|_| true),
            Box::new(move |_, _| {
                *counter.lock() += 1;
                Ok(())
            }),
            0,
        );

        trigger_simple(&manager, &HookEvent::StackPush(Value::Unit)).unwrap();
        assert!(manager.disable_hook(id));
        trigger_simple(&manager, &HookEvent::StackPush(Value::Unit)).unwrap();
        assert!(manager.enable_hook(id));
        trigger_simple(&manager, &HookEvent::StackPush(Value::Unit)).unwrap();

        assert_eq!(*fired.lock(), 2);
    }

    #[test]
    fn test_callback_error_becomes_hook_aborted() {
        let mut manager = HookManager::new();
        manager.register_hook(
            Box::new(|_| true),
            Box::new(|_, _| Err("breakpoint".to_string())),
            0,
        );

        let result = trigger_simple(&manager, &HookEvent::StackPush(Value::Unit));
        assert_eq!(
            result,
            Err(VmError::HookAborted("breakpoint".to_string()))
        );
    }

    #[test]
    fn test_unregister() {
        let mut manager = HookManager::new();
        let id = manager.register_hook(Box::new(|_| true), Box::new(|_, _| Ok(())), 0);

        assert!(manager.unregister_hook(id));
        assert!(!manager.unregister_hook(id));
        assert!(!manager.has_hooks());
    }
}
