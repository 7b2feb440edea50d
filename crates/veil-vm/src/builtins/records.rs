//! Object builtins

use crate::error::VmError;
use crate::foreign::ForeignFunctionContext;
use veil_types::Value;

/// `create_object()`: allocate an empty object, return its handle.
pub(crate) fn vm_create_object(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("create_object", 0)?;
    Ok(context.vm_state.object_store.create_object())
}

/// `get_field(target, key)`: read a field of an object or array.
/// Missing fields read as unit.
pub(crate) fn vm_get_field(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("get_field", 2)?;
    let target = context.args[0].clone();
    let key = context.args[1].clone();
    context.vm_state.get_field(&target, &key)
}

/// `set_field(target, key, value)`: write a field of an object or
/// array.
pub(crate) fn vm_set_field(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("set_field", 3)?;
    let target = context.args[0].clone();
    let key = context.args[1].clone();
    let value = context.args[2].clone();
    context.vm_state.set_field(&target, key, value)?;
    Ok(Value::Unit)
}
