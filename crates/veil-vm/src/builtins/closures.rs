//! Closure builtins

use crate::error::VmError;
use crate::foreign::ForeignFunctionContext;
use std::sync::Arc;
use veil_types::Value;

/// `create_closure(function_name, upvalue_names...)`: capture the named
/// values from the current scope (by deep copy) into a new closure.
pub(crate) fn vm_create_closure(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_at_least("create_closure", 1)?;

    let function_name = match &context.args[0] {
        Value::Str(name) => name.clone(),
        other => {
            return Err(VmError::TypeMismatch {
                operation: "create_closure",
                detail: format!("function name must be a string, got {}", other.type_name()),
            })
        }
    };

    let mut upvalue_names = Vec::with_capacity(context.args.len() - 1);
    for argument in &context.args[1..] {
        match argument {
            Value::Str(name) => upvalue_names.push(name.clone()),
            other => {
                return Err(VmError::TypeMismatch {
                    operation: "create_closure",
                    detail: format!("upvalue name must be a string, got {}", other.type_name()),
                })
            }
        }
    }

    context.vm_state.create_closure(&function_name, &upvalue_names)
}

/// `call_closure(closure, args...)`: invoke a closure. The callee frame
/// is pushed and delivers its result through its own `RET`.
pub(crate) fn vm_call_closure(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_at_least("call_closure", 1)?;

    let closure = match &context.args[0] {
        Value::Closure(closure) => Arc::clone(closure),
        other => {
            return Err(VmError::TypeMismatch {
                operation: "call_closure",
                detail: format!("expected closure, got {}", other.type_name()),
            })
        }
    };

    context.vm_state.call_closure(&closure, &context.args[1..])?;
    Ok(Value::Unit)
}

/// `get_upvalue(name)`: read an upvalue of the calling frame.
pub(crate) fn vm_get_upvalue(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("get_upvalue", 1)?;
    match &context.args[0] {
        Value::Str(name) => {
            let name = name.clone();
            context.vm_state.get_upvalue(&name)
        }
        other => Err(VmError::TypeMismatch {
            operation: "get_upvalue",
            detail: format!("upvalue name must be a string, got {}", other.type_name()),
        }),
    }
}

/// `set_upvalue(name, value)`: overwrite an upvalue of the calling
/// frame.
pub(crate) fn vm_set_upvalue(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("set_upvalue", 2)?;
    match &context.args[0] {
        Value::Str(name) => {
            let name = name.clone();
            let value = context.args[1].clone();
            context.vm_state.set_upvalue(&name, value)?;
            Ok(Value::Unit)
        }
        other => Err(VmError::TypeMismatch {
            operation: "set_upvalue",
            detail: format!("upvalue name must be a string, got {}", other.type_name()),
        }),
    }
}
