//! Array builtins

use crate::error::VmError;
use crate::foreign::ForeignFunctionContext;
use veil_types::Value;

/// `create_array(capacity?)`: allocate an empty array, optionally with
/// reserved dense capacity.
pub(crate) fn vm_create_array(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    match context.args {
        [] => Ok(context.vm_state.object_store.create_array()),
        [capacity] => {
            let capacity = capacity.as_index().ok_or_else(|| VmError::TypeMismatch {
                operation: "create_array",
                detail: format!("capacity must be an integer, got {}", capacity.type_name()),
            })?;
            Ok(context
                .vm_state
                .object_store
                .create_array_with_capacity(capacity.max(0) as usize))
        }
        _ => Err(VmError::ArityMismatch {
            function: "create_array".to_string(),
            expected: 1,
            got: context.args.len(),
        }),
    }
}

/// `array_length(array)`: length of the dense prefix.
pub(crate) fn vm_array_length(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("array_length", 1)?;
    match &context.args[0] {
        Value::Array(handle) => {
            let array = context.vm_state.object_store.get_array(*handle)?;
            Ok(Value::I64(array.length() as i64))
        }
        other => Err(VmError::TypeMismatch {
            operation: "array_length",
            detail: format!("expected array, got {}", other.type_name()),
        }),
    }
}

/// `array_push(array, values...)`: append each value at the end of the
/// dense prefix, returning the new length.
pub(crate) fn vm_array_push(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_at_least("array_push", 2)?;
    let target = context.args[0].clone();

    let handle = match &target {
        Value::Array(handle) => *handle,
        other => {
            return Err(VmError::TypeMismatch {
                operation: "array_push",
                detail: format!("expected array, got {}", other.type_name()),
            })
        }
    };

    for value in &context.args[1..] {
        let next = context.vm_state.object_store.get_array(handle)?.length() + 1;
        context
            .vm_state
            .set_field(&target, Value::I64(next as i64), value.clone())?;
    }

    let length = context.vm_state.object_store.get_array(handle)?.length();
    Ok(Value::I64(length as i64))
}
