//! Core data model for the Veil virtual machine
//!
//! This crate defines the types the VM executes over, independent of the
//! execution engine itself:
//!
//! - `value`: the runtime value representation, including the opaque
//!   `Share` variant carried on behalf of an external MPC protocol
//! - `store`: the object/array heap and foreign-object storage, addressed
//!   by opaque numeric handles
//! - `closure`: closures and their captured upvalues
//! - `instruction`: the instruction set executed by the VM
//!
//! Composite values are only ever reached through handles into the store;
//! copying a `Value` never copies the data it refers to.

pub mod closure;
pub mod instruction;
pub mod store;
pub mod value;

pub use closure::{Closure, Upvalue};
pub use instruction::Instruction;
pub use store::{ForeignObjectStorage, ObjectStore, StoreError};
pub use value::{ShareType, Value, FLOAT_SCALE};
