//! Control-flow instructions: JMP, JMPEQ, JMPNEQ, CMP, CALL, RET

use crate::error::VmError;
use crate::foreign::ForeignFunctionContext;
use crate::function::{Function, VMFunction};
use crate::hooks::HookEvent;
use crate::vm::result::Flow;
use crate::vm::{ops, VMState};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;
use veil_types::{Closure, Upvalue, Value};

impl VMState {
    pub(crate) fn exec_jmp(
        &mut self,
        function: &Arc<VMFunction>,
        label: &str,
    ) -> Result<(), VmError> {
        let target = function.label_target(label)?;
        self.current_frame_mut()?.instruction_pointer = target;
        Ok(())
    }

    pub(crate) fn exec_jmpeq(
        &mut self,
        function: &Arc<VMFunction>,
        label: &str,
    ) -> Result<(), VmError> {
        if self.current_frame()?.compare_flag == Ordering::Equal {
            self.exec_jmp(function, label)?;
        }
        Ok(())
    }

    pub(crate) fn exec_jmpneq(
        &mut self,
        function: &Arc<VMFunction>,
        label: &str,
    ) -> Result<(), VmError> {
        if self.current_frame()?.compare_flag != Ordering::Equal {
            self.exec_jmp(function, label)?;
        }
        Ok(())
    }

    /// `CMP(r1, r2)`: three-way comparison into the frame's compare
    /// flag.
    pub(crate) fn exec_cmp(&mut self, r1: usize, r2: usize) -> Result<(), VmError> {
        let (lhs, rhs) = self.binary_operands(r1, r2)?;
        let ordering = ops::compare(&lhs, &rhs)?;
        self.current_frame_mut()?.compare_flag = ordering;
        Ok(())
    }

    /// `CALL(name)`: resolve the callee and either push a new frame
    /// (VM function) or run it in place (foreign function).
    pub(crate) fn exec_call(&mut self, name: &str) -> Result<(), VmError> {
        // Collect staged arguments in push order; the staging buffer is
        // cleared as part of call setup
        let args: Vec<Value> = {
            let frame = self.current_frame_mut()?;
            frame.stack.drain(..).collect()
        };

        if self.hook_manager.has_hooks() {
            for value in args.iter().rev() {
                self.trigger_hook(&HookEvent::StackPop(value.clone()))?;
            }
        }

        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::UndefinedFunction(name.to_string()))?;

        match function {
            Function::VM(vm_function) => {
                // Upvalues the callee declares are resolved against the
                // current scope chain
                let mut upvalues = Vec::with_capacity(vm_function.upvalues.len());
                for upvalue_name in &vm_function.upvalues {
                    let value = self
                        .find_upvalue(upvalue_name)
                        .ok_or_else(|| VmError::UndefinedUpvalue(upvalue_name.clone()))?;
                    upvalues.push(Upvalue {
                        name: upvalue_name.clone(),
                        value,
                    });
                }

                if self.hook_manager.has_hooks() {
                    let callee = Value::Closure(Arc::new(Closure {
                        function_id: vm_function.name.clone(),
                        upvalues: upvalues.clone(),
                    }));
                    self.trigger_hook(&HookEvent::BeforeFunctionCall(callee, args.clone()))?;
                }

                self.push_vm_frame(&vm_function, upvalues, &args)
            }
            Function::Foreign(foreign) => {
                let depth_before = self.activation_records.len();

                if self.hook_manager.has_hooks() {
                    let callee = Value::Str(format!("<foreign function {}>", name));
                    self.trigger_hook(&HookEvent::BeforeFunctionCall(callee, args.clone()))?;
                }

                let result = (foreign.func)(ForeignFunctionContext {
                    args: &args,
                    vm_state: self,
                })?;

                // A foreign function may enter a VM function on our
                // behalf (call_closure); the pushed frame delivers the
                // result through its own RET
                if self.activation_records.len() > depth_before {
                    return Ok(());
                }

                self.write_register(0, result.clone())?;

                if self.hook_manager.has_hooks() {
                    let callee = Value::Str(format!("<foreign function {}>", name));
                    self.trigger_hook(&HookEvent::AfterFunctionCall(callee, result))?;
                }
                Ok(())
            }
        }
    }

    /// `RET(reg)`: pop the current frame; deliver the value to the
    /// caller's register 0, or finish the program if this was the last
    /// frame.
    pub(crate) fn exec_ret(&mut self, reg: usize) -> Result<Flow, VmError> {
        let (return_value, returning_from) = {
            let frame = self.current_frame()?;
            (frame.register(reg)?.clone(), frame.function_name.clone())
        };

        debug!(function = %returning_from, "return");

        let frame = self
            .activation_records
            .pop()
            .ok_or_else(crate::vm::no_active_frame)?;
        self.frame_pool.release(frame);

        if self.activation_records.is_empty() {
            return Ok(Flow::Return(return_value));
        }

        if self.hook_manager.has_hooks() {
            let old = self
                .current_frame_mut()?
                .set_register(0, return_value.clone())?;
            self.trigger_hook(&HookEvent::RegisterWrite(0, old, return_value.clone()))?;

            let callee = Value::Str(format!("<function {}>", returning_from));
            self.trigger_hook(&HookEvent::AfterFunctionCall(callee, return_value))?;
        } else {
            self.current_frame_mut()?.set_register(0, return_value)?;
        }

        Ok(Flow::Continue)
    }
}
