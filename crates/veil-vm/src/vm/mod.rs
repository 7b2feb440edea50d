//! Virtual machine execution engine
//!
//! [`VMState`] is the authoritative runtime state: function registry,
//! activation record stack, object store, foreign objects, and hooks.
//! [`VirtualMachine`] wraps it in a mutex so that at most one logical
//! thread of control executes instructions at any instant; the
//! mutual-exclusion boundary sits around the whole `execute()` call.
//!
//! Execution is synchronous and run-to-completion per instruction. The
//! first runtime error aborts the entire run and is reported as a
//! [`Fault`] carrying the function name and instruction pointer at the
//! fault site.

use crate::bytecode::{BytecodeModule, LoadError};
use crate::config::VmConfig;
use crate::error::{Fault, VmError};
use crate::foreign::{ForeignFunction, ForeignFunctionContext};
use crate::function::{Function, VMFunction};
use crate::hooks::{HookCallback, HookContext, HookEvent, HookManager, HookPredicate};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, trace};
use veil_types::{Closure, ForeignObjectStorage, ObjectStore, Upvalue, Value};

pub mod frame;
pub(crate) mod ops;
mod execution;
mod result;

pub use frame::{ActivationRecord, FramePool};
use result::Flow;

/// Capacity of the activation-record recycling pool.
const FRAME_POOL_CAPACITY: usize = 1024;

pub(crate) fn no_active_frame() -> VmError {
    VmError::CorruptBytecode("no active frame".to_string())
}

/// Runtime state of the virtual machine.
pub struct VMState {
    /// Registry of all functions, both VM and foreign
    pub functions: FxHashMap<String, Function>,
    /// Stack of activation records, one per live call
    pub(crate) activation_records: SmallVec<[ActivationRecord; 8]>,
    /// Instruction pointer of the instruction currently executing
    pub(crate) current_instruction: usize,
    /// Pool of recycled activation records
    pub(crate) frame_pool: FramePool,
    /// Storage for objects and arrays
    pub object_store: ObjectStore,
    /// Storage for opaque host objects
    pub foreign_objects: ForeignObjectStorage,
    /// Hook registry for debugging and instrumentation
    pub hook_manager: HookManager,
    pub(crate) config: VmConfig,
}

impl VMState {
    pub fn new(config: VmConfig) -> Self {
        let mut state = VMState {
            functions: FxHashMap::default(),
            activation_records: SmallVec::new(),
            current_instruction: 0,
            frame_pool: FramePool::new(FRAME_POOL_CAPACITY),
            object_store: ObjectStore::new(),
            foreign_objects: ForeignObjectStorage::new(),
            hook_manager: HookManager::new(),
            config,
        };
        crate::builtins::install(&mut state);
        state
    }

    /// Current call depth.
    pub fn call_depth(&self) -> usize {
        self.activation_records.len()
    }

    pub(crate) fn current_frame(&self) -> Result<&ActivationRecord, VmError> {
        self.activation_records.last().ok_or_else(no_active_frame)
    }

    pub(crate) fn current_frame_mut(&mut self) -> Result<&mut ActivationRecord, VmError> {
        self.activation_records
            .last_mut()
            .ok_or_else(no_active_frame)
    }

    /// Register an interpreted function. Definitions are read-only from
    /// here on.
    pub fn register_function(&mut self, function: VMFunction) {
        debug!(function = %function.name, "register VM function");
        self.functions
            .insert(function.name.clone(), Function::VM(Arc::new(function)));
    }

    /// Register a native implementation under a name.
    pub fn register_foreign_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(ForeignFunctionContext<'_>) -> Result<Value, VmError> + Send + Sync + 'static,
    {
        debug!(function = name, "register foreign function");
        self.functions.insert(
            name.to_string(),
            Function::Foreign(ForeignFunction {
                name: name.to_string(),
                func: Arc::new(func),
            }),
        );
    }

    /// Fire a hook event against the current state. No-op when nothing
    /// is registered.
    pub(crate) fn trigger_hook(&self, event: &HookEvent) -> Result<(), VmError> {
        if !self.hook_manager.has_hooks() {
            return Ok(());
        }
        let context = HookContext::new(&self.activation_records, self.current_instruction);
        self.hook_manager.trigger(event, &context)
    }

    /// Read a register of the current frame, firing `RegisterRead`.
    pub(crate) fn read_register(&mut self, reg: usize) -> Result<Value, VmError> {
        let value = self.current_frame()?.register(reg)?.clone();
        if self.hook_manager.has_hooks() {
            self.trigger_hook(&HookEvent::RegisterRead(reg, value.clone()))?;
        }
        Ok(value)
    }

    /// Write a register of the current frame, firing `RegisterWrite`.
    pub(crate) fn write_register(&mut self, reg: usize, value: Value) -> Result<(), VmError> {
        if self.hook_manager.has_hooks() {
            let new = value.clone();
            let old = self.current_frame_mut()?.set_register(reg, value)?;
            self.trigger_hook(&HookEvent::RegisterWrite(reg, old, new))
        } else {
            self.current_frame_mut()?.set_register(reg, value)?;
            Ok(())
        }
    }

    /// Find a named value in the current lexical scope: locals first,
    /// then upvalues, walking from the innermost frame outward.
    pub fn find_upvalue(&self, name: &str) -> Option<Value> {
        for record in self.activation_records.iter().rev() {
            if let Some(value) = record.locals.get(name) {
                return Some(value.clone());
            }
            if let Some(upvalue) = record.upvalue(name) {
                return Some(upvalue.value.clone());
            }
        }
        None
    }

    /// Read an upvalue of the current frame, firing `UpvalueRead`.
    pub fn get_upvalue(&mut self, name: &str) -> Result<Value, VmError> {
        let value = self
            .current_frame()?
            .upvalue(name)
            .map(|upvalue| upvalue.value.clone())
            .ok_or_else(|| VmError::UndefinedUpvalue(name.to_string()))?;
        if self.hook_manager.has_hooks() {
            self.trigger_hook(&HookEvent::UpvalueRead(name.to_string(), value.clone()))?;
        }
        Ok(value)
    }

    /// Overwrite an upvalue of the current frame, firing `UpvalueWrite`.
    pub fn set_upvalue(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        let old = self
            .current_frame_mut()?
            .set_upvalue(name, value.clone())
            .ok_or_else(|| VmError::UndefinedUpvalue(name.to_string()))?;
        if self.hook_manager.has_hooks() {
            self.trigger_hook(&HookEvent::UpvalueWrite(name.to_string(), old, value))?;
        }
        Ok(())
    }

    /// Read a field of an object or array, firing the matching read
    /// event. Missing fields read as `Unit`.
    pub fn get_field(&mut self, target: &Value, key: &Value) -> Result<Value, VmError> {
        let value = self.object_store.get_field(target, key)?;
        if self.hook_manager.has_hooks() {
            let event = match target {
                Value::Object(handle) => {
                    HookEvent::ObjectFieldRead(*handle, key.clone(), value.clone())
                }
                Value::Array(handle) => {
                    HookEvent::ArrayElementRead(*handle, key.clone(), value.clone())
                }
                _ => return Ok(value),
            };
            self.trigger_hook(&event)?;
        }
        Ok(value)
    }

    /// Write a field of an object or array, firing the matching write
    /// event.
    pub fn set_field(&mut self, target: &Value, key: Value, value: Value) -> Result<(), VmError> {
        if self.hook_manager.has_hooks() {
            let old = self.object_store.get_field(target, &key)?;
            self.object_store
                .set_field(target, key.clone(), value.clone())?;
            let event = match target {
                Value::Object(handle) => HookEvent::ObjectFieldWrite(*handle, key, old, value),
                Value::Array(handle) => HookEvent::ArrayElementWrite(*handle, key, old, value),
                _ => return Ok(()),
            };
            self.trigger_hook(&event)
        } else {
            self.object_store.set_field(target, key, value)?;
            Ok(())
        }
    }

    /// Create a closure over the current scope. Each captured value is
    /// deep-copied, so the closure never aliases its defining scope.
    pub fn create_closure(
        &mut self,
        function_name: &str,
        upvalue_names: &[String],
    ) -> Result<Value, VmError> {
        if !self.functions.contains_key(function_name) {
            return Err(VmError::UndefinedFunction(function_name.to_string()));
        }

        let mut upvalues = Vec::with_capacity(upvalue_names.len());
        for name in upvalue_names {
            let value = self
                .find_upvalue(name)
                .ok_or_else(|| VmError::UndefinedUpvalue(name.clone()))?;
            let value = self.object_store.deep_copy(&value)?;
            upvalues.push(Upvalue {
                name: name.clone(),
                value,
            });
        }

        if self.hook_manager.has_hooks() {
            self.trigger_hook(&HookEvent::ClosureCreated(
                function_name.to_string(),
                upvalues.clone(),
            ))?;
        }

        Ok(Value::Closure(Arc::new(Closure {
            function_id: function_name.to_string(),
            upvalues,
        })))
    }

    /// Invoke a closure: arity-checked like a plain call, with the new
    /// frame's upvalues seeded from the closure's captures. The frame is
    /// pushed; execution continues there on the next dispatch.
    pub fn call_closure(&mut self, closure: &Arc<Closure>, args: &[Value]) -> Result<(), VmError> {
        let function = match self.functions.get(&closure.function_id) {
            Some(Function::VM(function)) => Arc::clone(function),
            Some(Function::Foreign(_)) => {
                return Err(VmError::TypeMismatch {
                    operation: "call_closure",
                    detail: format!("'{}' is a foreign function", closure.function_id),
                })
            }
            None => return Err(VmError::UndefinedFunction(closure.function_id.clone())),
        };

        if self.hook_manager.has_hooks() {
            self.trigger_hook(&HookEvent::BeforeFunctionCall(
                Value::Closure(Arc::clone(closure)),
                args.to_vec(),
            ))?;
        }

        self.push_vm_frame(&function, closure.upvalues.clone(), args)
    }

    /// Call a foreign function directly (used by instruction handlers
    /// for share delegation, and by hosts). Runs in place on the current
    /// frame; the call stack is unchanged on return.
    pub fn call_foreign_function(&mut self, name: &str, args: &[Value]) -> Result<Value, VmError> {
        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::UndefinedFunction(name.to_string()))?;
        let foreign = match function {
            Function::Foreign(foreign) => foreign,
            Function::VM(_) => {
                return Err(VmError::TypeMismatch {
                    operation: "foreign call",
                    detail: format!("'{}' is a VM function", name),
                })
            }
        };

        if self.hook_manager.has_hooks() {
            let callee = Value::Str(format!("<foreign function {}>", name));
            self.trigger_hook(&HookEvent::BeforeFunctionCall(callee, args.to_vec()))?;
        }

        let result = (foreign.func)(ForeignFunctionContext {
            args,
            vm_state: self,
        })?;

        if self.hook_manager.has_hooks() {
            let callee = Value::Str(format!("<foreign function {}>", name));
            self.trigger_hook(&HookEvent::AfterFunctionCall(callee, result.clone()))?;
        }
        Ok(result)
    }

    /// Allocate and push an activation record for a VM function call:
    /// arity check, depth check, arguments bound to registers `0..n`
    /// and to locals by parameter name.
    pub(crate) fn push_vm_frame(
        &mut self,
        function: &Arc<VMFunction>,
        upvalues: Vec<Upvalue>,
        args: &[Value],
    ) -> Result<(), VmError> {
        if function.parameters.len() != args.len() {
            return Err(VmError::ArityMismatch {
                function: function.name.clone(),
                expected: function.parameters.len(),
                got: args.len(),
            });
        }
        if self.activation_records.len() >= self.config.max_call_depth {
            return Err(VmError::StackOverflow(self.config.max_call_depth));
        }

        debug!(function = %function.name, depth = self.activation_records.len() + 1, "call");

        let mut record = self
            .frame_pool
            .acquire(&function.name, function.register_count);
        record.upvalues = upvalues;

        for (index, (parameter, value)) in function.parameters.iter().zip(args).enumerate() {
            record.set_register(index, value.clone())?;
            record.locals.insert(parameter.clone(), value.clone());
        }

        self.activation_records.push(record);

        if self.hook_manager.has_hooks() {
            for (parameter, value) in function.parameters.iter().zip(args) {
                self.trigger_hook(&HookEvent::LocalWrite(
                    parameter.clone(),
                    Value::Unit,
                    value.clone(),
                ))?;
            }
        }
        Ok(())
    }

    /// Release every abandoned frame back to the pool.
    pub(crate) fn drain_frames(&mut self) {
        while let Some(frame) = self.activation_records.pop() {
            self.frame_pool.release(frame);
        }
    }

    fn abort(&mut self, error: VmError, function: String, ip: usize) -> Fault {
        self.drain_frames();
        Fault::new(error, function, ip)
    }

    /// The fetch-decode-execute loop. Runs until a `RET` pops the last
    /// frame or the first error aborts the run.
    pub fn execute_until_return(&mut self) -> Result<Value, Fault> {
        loop {
            let (function_name, ip) = match self.activation_records.last() {
                Some(frame) => (frame.function_name.clone(), frame.instruction_pointer),
                None => {
                    return Err(Fault::new(no_active_frame(), "<vm>", 0));
                }
            };

            let vm_function = match self.functions.get(&function_name) {
                Some(Function::VM(function)) => Arc::clone(function),
                Some(Function::Foreign(_)) => {
                    let error = VmError::TypeMismatch {
                        operation: "execute",
                        detail: format!("'{}' is a foreign function", function_name),
                    };
                    return Err(self.abort(error, function_name, ip));
                }
                None => {
                    let error = VmError::UndefinedFunction(function_name.clone());
                    return Err(self.abort(error, function_name, ip));
                }
            };

            // Fetch; running past the end of a function is bytecode
            // corruption, not an implicit return
            let instruction = match vm_function.instructions.get(ip) {
                Some(instruction) => instruction.clone(),
                None => {
                    let error = VmError::CorruptBytecode(format!(
                        "instruction pointer {} out of range for '{}'",
                        ip, function_name
                    ));
                    return Err(self.abort(error, function_name, ip));
                }
            };

            trace!(function = %function_name, ip, %instruction, "dispatch");

            self.current_instruction = ip;
            if let Some(frame) = self.activation_records.last_mut() {
                // Advance by default; jumps, calls, and returns override
                frame.instruction_pointer += 1;
            }

            let hooks_enabled = self.hook_manager.has_hooks();

            if hooks_enabled {
                if let Err(error) =
                    self.trigger_hook(&HookEvent::BeforeInstructionExecute(instruction.clone()))
                {
                    return Err(self.abort(error, function_name, ip));
                }
            }

            let flow = match self.step(&instruction, &vm_function) {
                Ok(flow) => flow,
                Err(error) => return Err(self.abort(error, function_name, ip)),
            };

            if hooks_enabled {
                if let Err(error) =
                    self.trigger_hook(&HookEvent::AfterInstructionExecute(instruction))
                {
                    return Err(self.abort(error, function_name, ip));
                }
            }

            if let Flow::Return(value) = flow {
                return Ok(value);
            }
        }
    }
}

/// The register-based virtual machine.
///
/// All authoritative state lives behind one mutex; `execute()` holds it
/// for the whole run, so programs never interleave.
pub struct VirtualMachine {
    state: Mutex<VMState>,
}

impl VirtualMachine {
    /// Create a VM with the default configuration and the standard
    /// library installed.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        VirtualMachine {
            state: Mutex::new(VMState::new(config)),
        }
    }

    /// Register an interpreted function.
    pub fn register_function(&self, function: VMFunction) {
        self.state.lock().register_function(function);
    }

    /// Register a native implementation under a name.
    pub fn register_foreign_function<F>(&self, name: &str, func: F)
    where
        F: Fn(ForeignFunctionContext<'_>) -> Result<Value, VmError> + Send + Sync + 'static,
    {
        self.state.lock().register_foreign_function(name, func);
    }

    /// Hand an opaque host object to the VM, receiving its handle value.
    pub fn register_foreign_object<T: Any + Send + Sync>(&self, object: T) -> Value {
        Value::Foreign(self.state.lock().foreign_objects.register_object(object))
    }

    /// Retrieve a host object by handle.
    pub fn get_foreign_object<T: Any + Send + Sync>(&self, handle: usize) -> Option<Arc<T>> {
        self.state.lock().foreign_objects.get_object(handle)
    }

    /// Register a hook; returns its id.
    pub fn register_hook<P, C>(&self, predicate: P, callback: C, priority: i32) -> usize
    where
        P: Fn(&HookEvent) -> bool + Send + Sync + 'static,
        C: Fn(&HookEvent, &HookContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.state.lock().hook_manager.register_hook(
            Box::new(predicate) as Box<HookPredicate>,
            Box::new(callback) as Box<HookCallback>,
            priority,
        )
    }

    pub fn unregister_hook(&self, hook_id: usize) -> bool {
        self.state.lock().hook_manager.unregister_hook(hook_id)
    }

    pub fn enable_hook(&self, hook_id: usize) -> bool {
        self.state.lock().hook_manager.enable_hook(hook_id)
    }

    pub fn disable_hook(&self, hook_id: usize) -> bool {
        self.state.lock().hook_manager.disable_hook(hook_id)
    }

    /// Load a bytecode module, registering every function it defines.
    pub fn load_module(&self, module: BytecodeModule) -> Result<(), LoadError> {
        let name = module.header.name.clone();
        let functions = module.into_functions()?;
        let mut state = self.state.lock();
        debug!(module = %name, count = functions.len(), "load module");
        for function in functions {
            state.register_function(function);
        }
        Ok(())
    }

    /// Execute an entry function that takes no arguments.
    pub fn execute(&self, function_name: &str) -> Result<Value, Fault> {
        self.enter(function_name, &[], false)
    }

    /// Call a function with arguments from the host. Foreign functions
    /// are dispatched directly.
    pub fn call_function(&self, function_name: &str, args: &[Value]) -> Result<Value, Fault> {
        self.enter(function_name, args, true)
    }

    /// Run a closure with access to the locked VM state. Useful for
    /// inspecting the object store or registry between runs.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut VMState) -> R) -> R {
        f(&mut self.state.lock())
    }

    fn enter(&self, name: &str, args: &[Value], allow_foreign: bool) -> Result<Value, Fault> {
        let mut state = self.state.lock();

        match state.functions.get(name).cloned() {
            Some(Function::VM(function)) => {
                if state.hook_manager.has_hooks() {
                    let callee = Value::Closure(Arc::new(Closure {
                        function_id: name.to_string(),
                        upvalues: Vec::new(),
                    }));
                    if let Err(error) =
                        state.trigger_hook(&HookEvent::BeforeFunctionCall(callee, args.to_vec()))
                    {
                        return Err(state.abort(error, name.to_string(), 0));
                    }
                }

                if let Err(error) = state.push_vm_frame(&function, Vec::new(), args) {
                    return Err(state.abort(error, name.to_string(), 0));
                }

                let result = state.execute_until_return()?;

                if state.hook_manager.has_hooks() {
                    let callee = Value::Closure(Arc::new(Closure {
                        function_id: name.to_string(),
                        upvalues: Vec::new(),
                    }));
                    if let Err(error) = state
                        .trigger_hook(&HookEvent::AfterFunctionCall(callee, result.clone()))
                    {
                        return Err(state.abort(error, name.to_string(), 0));
                    }
                }

                Ok(result)
            }
            Some(Function::Foreign(_)) if allow_foreign => state
                .call_foreign_function(name, args)
                .map_err(|error| Fault::new(error, name, 0)),
            Some(Function::Foreign(_)) => {
                let error = VmError::TypeMismatch {
                    operation: "execute",
                    detail: format!("'{}' is a foreign function", name),
                };
                Err(Fault::new(error, name, 0))
            }
            None => Err(Fault::new(
                VmError::UndefinedFunction(name.to_string()),
                name,
                0,
            )),
        }
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}
