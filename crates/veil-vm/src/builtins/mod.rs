//! Built-in functions
//!
//! The entire standard library goes through the foreign-function
//! surface; no builtin is an opcode. Organized by category:
//! - I/O: `print`
//! - Records: object creation and field access
//! - Arrays: creation, length, push
//! - Closures: creation, invocation, upvalue access
//! - Utils: type inspection

pub mod array;
pub mod closures;
pub mod io;
pub mod records;
pub mod utils;

use crate::vm::VMState;

/// Install the standard library into a fresh VM state.
pub(crate) fn install(state: &mut VMState) {
    // I/O
    state.register_foreign_function("print", io::vm_print);

    // Records
    state.register_foreign_function("create_object", records::vm_create_object);
    state.register_foreign_function("get_field", records::vm_get_field);
    state.register_foreign_function("set_field", records::vm_set_field);

    // Arrays
    state.register_foreign_function("create_array", array::vm_create_array);
    state.register_foreign_function("array_length", array::vm_array_length);
    state.register_foreign_function("array_push", array::vm_array_push);

    // Closures
    state.register_foreign_function("create_closure", closures::vm_create_closure);
    state.register_foreign_function("call_closure", closures::vm_call_closure);
    state.register_foreign_function("get_upvalue", closures::vm_get_upvalue);
    state.register_foreign_function("set_upvalue", closures::vm_set_upvalue);

    // Utils
    state.register_foreign_function("type", utils::vm_type);
}
