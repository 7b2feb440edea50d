//! I/O builtins

use crate::error::VmError;
use crate::foreign::ForeignFunctionContext;
use veil_types::Value;

/// `print(args...)`: space-separated, newline-terminated. Shares print
/// as their opaque form; this never reveals share contents.
pub(crate) fn vm_print(context: ForeignFunctionContext<'_>) -> Result<Value, VmError> {
    let line = context
        .args
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(Value::Unit)
}
