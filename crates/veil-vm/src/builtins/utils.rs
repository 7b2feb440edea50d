//! Type inspection builtins

use crate::error::VmError;
use crate::foreign::ForeignFunctionContext;
use veil_types::Value;

/// `type(value)`: the value's type name as a string.
pub(crate) fn vm_type(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    context.expect_args("type", 1)?;
    Ok(Value::Str(context.args[0].type_name().to_string()))
}
