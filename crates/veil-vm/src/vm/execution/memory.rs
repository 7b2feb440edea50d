//! Memory instructions: LD, LDI, MOV, PUSHARG

use crate::error::VmError;
use crate::hooks::HookEvent;
use crate::vm::VMState;
use veil_types::Value;

impl VMState {
    /// `LD(dest, offset)`: load from the argument-staging stack,
    /// addressed relative to the stack pointer.
    pub(crate) fn exec_ld(&mut self, dest: usize, offset: i32) -> Result<(), VmError> {
        let value = {
            let frame = self.current_frame()?;
            let stack_len = frame.stack.len() as i32;
            let index = stack_len + offset - 1;
            if index < 0 || index >= stack_len {
                return Err(VmError::CorruptBytecode(format!(
                    "stack address [sp{:+}] out of range",
                    offset
                )));
            }
            frame.stack[index as usize].clone()
        };
        self.write_register(dest, value)
    }

    /// `LDI(dest, value)`: load an immediate value.
    pub(crate) fn exec_ldi(&mut self, dest: usize, value: &Value) -> Result<(), VmError> {
        self.write_register(dest, value.clone())
    }

    /// `MOV(dest, src)`: copy a register. No domain conversion ever
    /// happens here: a `Share` stays a `Share`, a clear value stays
    /// clear.
    pub(crate) fn exec_mov(&mut self, dest: usize, src: usize) -> Result<(), VmError> {
        let value = self.read_register(src)?;
        self.write_register(dest, value)
    }

    /// `PUSHARG(src)`: stage an argument for the next `CALL`.
    pub(crate) fn exec_pusharg(&mut self, src: usize) -> Result<(), VmError> {
        let value = self.current_frame()?.register(src)?.clone();
        self.current_frame_mut()?.stack.push(value.clone());
        if self.hook_manager.has_hooks() {
            self.trigger_hook(&HookEvent::StackPush(value))?;
        }
        Ok(())
    }
}
