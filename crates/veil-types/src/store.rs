//! Object and array heap
//!
//! The store is the sole owner of composite data. Every other component
//! holds opaque `usize` handles; handles are allocated monotonically and
//! never reused, so a stale handle can be detected rather than silently
//! pointing at new data.
//!
//! Arrays are hybrid: a dense 1-based prefix backed by a `Vec`, with a
//! sparse overflow map for far-out or non-integer keys.

use crate::value::Value;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Gap size up to which a dense array is extended in place rather than
/// spilling the write into the sparse map.
const DENSE_EXTENSION_LIMIT: usize = 16;

/// Errors raised by the store itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object with handle {0} not found")]
    MissingObject(usize),

    #[error("array with handle {0} not found")]
    MissingArray(usize),

    #[error("expected object or array, got {0}")]
    NotComposite(&'static str),
}

/// A key-value object.
#[derive(Debug, Clone, Default)]
pub struct Object {
    pub fields: FxHashMap<Value, Value>,
}

/// A hybrid dense/sparse array, indexed from 1.
#[derive(Debug, Clone, Default)]
pub struct Array {
    elements: Vec<Value>,
    extra_fields: FxHashMap<Value, Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Array {
            elements: Vec::with_capacity(capacity),
            extra_fields: FxHashMap::default(),
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        match key.as_index() {
            Some(idx) if idx >= 1 && (idx as usize) <= self.elements.len() => {
                Some(&self.elements[idx as usize - 1])
            }
            _ => self.extra_fields.get(key),
        }
    }

    pub fn set(&mut self, key: Value, value: Value) {
        match key.as_index() {
            Some(idx) if idx >= 1 => {
                let slot = idx as usize - 1;

                if slot == self.elements.len() {
                    self.elements.push(value);
                    return;
                }

                if slot < self.elements.len() {
                    self.elements[slot] = value;
                    return;
                }

                // Small gaps extend the dense prefix; large gaps go sparse
                if slot < self.elements.len() + DENSE_EXTENSION_LIMIT {
                    self.elements.resize(slot + 1, Value::Unit);
                    self.elements[slot] = value;
                    return;
                }

                self.extra_fields.insert(key, value);
            }
            _ => {
                self.extra_fields.insert(key, value);
            }
        }
    }

    /// Length of the dense prefix.
    pub fn length(&self) -> usize {
        self.elements.len()
    }

    pub fn dense_elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn sparse_entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.extra_fields.iter()
    }
}

/// Arena of objects and arrays.
#[derive(Debug)]
pub struct ObjectStore {
    objects: FxHashMap<usize, Object>,
    arrays: FxHashMap<usize, Array>,
    next_handle: usize,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        ObjectStore {
            objects: FxHashMap::default(),
            arrays: FxHashMap::default(),
            next_handle: 1,
        }
    }

    fn allocate_handle(&mut self) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Allocate a fresh object and return its value handle.
    pub fn create_object(&mut self) -> Value {
        let handle = self.allocate_handle();
        self.objects.insert(handle, Object::default());
        Value::Object(handle)
    }

    /// Allocate a fresh array and return its value handle.
    pub fn create_array(&mut self) -> Value {
        let handle = self.allocate_handle();
        self.arrays.insert(handle, Array::new());
        Value::Array(handle)
    }

    /// Allocate a fresh array with reserved dense capacity.
    pub fn create_array_with_capacity(&mut self, capacity: usize) -> Value {
        let handle = self.allocate_handle();
        self.arrays.insert(handle, Array::with_capacity(capacity));
        Value::Array(handle)
    }

    pub fn get_object(&self, handle: usize) -> Result<&Object, StoreError> {
        self.objects
            .get(&handle)
            .ok_or(StoreError::MissingObject(handle))
    }

    pub fn get_object_mut(&mut self, handle: usize) -> Result<&mut Object, StoreError> {
        self.objects
            .get_mut(&handle)
            .ok_or(StoreError::MissingObject(handle))
    }

    pub fn get_array(&self, handle: usize) -> Result<&Array, StoreError> {
        self.arrays
            .get(&handle)
            .ok_or(StoreError::MissingArray(handle))
    }

    pub fn get_array_mut(&mut self, handle: usize) -> Result<&mut Array, StoreError> {
        self.arrays
            .get_mut(&handle)
            .ok_or(StoreError::MissingArray(handle))
    }

    /// Read a field. Missing fields on a live object or array read as
    /// `Unit`; only a dead handle or a non-composite target is an error.
    pub fn get_field(&self, target: &Value, key: &Value) -> Result<Value, StoreError> {
        match target {
            Value::Object(handle) => {
                let object = self.get_object(*handle)?;
                Ok(object.fields.get(key).cloned().unwrap_or(Value::Unit))
            }
            Value::Array(handle) => {
                let array = self.get_array(*handle)?;
                Ok(array.get(key).cloned().unwrap_or(Value::Unit))
            }
            other => Err(StoreError::NotComposite(other.type_name())),
        }
    }

    /// Write a field. Always succeeds on a live handle; arrays grow as
    /// needed.
    pub fn set_field(&mut self, target: &Value, key: Value, value: Value) -> Result<(), StoreError> {
        match target {
            Value::Object(handle) => {
                let object = self.get_object_mut(*handle)?;
                object.fields.insert(key, value);
                Ok(())
            }
            Value::Array(handle) => {
                let array = self.get_array_mut(*handle)?;
                array.set(key, value);
                Ok(())
            }
            other => Err(StoreError::NotComposite(other.type_name())),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    /// Recursively copy a value so the result shares no handles with the
    /// source. This is the closure-capture primitive: primitives clone,
    /// objects and arrays are copied into fresh handles, closures and
    /// foreign handles stay shared (closures are immutable, foreign
    /// objects are opaque to the VM).
    pub fn deep_copy(&mut self, value: &Value) -> Result<Value, StoreError> {
        match value {
            Value::Object(handle) => {
                let entries: Vec<(Value, Value)> = self
                    .get_object(*handle)?
                    .fields
                    .iter()
                    .map(|(key, field)| (key.clone(), field.clone()))
                    .collect();

                let copy = self.create_object();
                for (key, field) in entries {
                    let field_copy = self.deep_copy(&field)?;
                    self.set_field(&copy, key, field_copy)?;
                }
                Ok(copy)
            }
            Value::Array(handle) => {
                let array = self.get_array(*handle)?;
                let dense: Vec<Value> = array.dense_elements().to_vec();
                let sparse: Vec<(Value, Value)> = array
                    .sparse_entries()
                    .map(|(key, element)| (key.clone(), element.clone()))
                    .collect();

                let copy = self.create_array_with_capacity(dense.len());
                for (slot, element) in dense.iter().enumerate() {
                    let element_copy = self.deep_copy(element)?;
                    self.set_field(&copy, Value::I64(slot as i64 + 1), element_copy)?;
                }
                for (key, element) in sparse {
                    let element_copy = self.deep_copy(&element)?;
                    self.set_field(&copy, key, element_copy)?;
                }
                Ok(copy)
            }
            other => Ok(other.clone()),
        }
    }
}

/// Storage for opaque host objects.
///
/// Objects are held behind `Arc<dyn Any + Send + Sync>`; anything that
/// needs mutation from the host side brings its own synchronization and
/// is only ever handed to the VM as a `Value::Foreign` handle.
pub struct ForeignObjectStorage {
    objects: FxHashMap<usize, Arc<dyn Any + Send + Sync>>,
    next_handle: usize,
}

impl Default for ForeignObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ForeignObjectStorage {
    pub fn new() -> Self {
        ForeignObjectStorage {
            objects: FxHashMap::default(),
            next_handle: 1,
        }
    }

    pub fn register_object<T: Any + Send + Sync>(&mut self, object: T) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(handle, Arc::new(object));
        handle
    }

    pub fn get_object<T: Any + Send + Sync>(&self, handle: usize) -> Option<Arc<T>> {
        let object = self.objects.get(&handle)?;
        Arc::clone(object).downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_reads_unit() {
        let mut store = ObjectStore::new();
        let object = store.create_object();

        assert_eq!(
            store.get_field(&object, &Value::Str("absent".into())).unwrap(),
            Value::Unit
        );
        // A second read is identical and has no side effects
        assert_eq!(
            store.get_field(&object, &Value::Str("absent".into())).unwrap(),
            Value::Unit
        );
    }

    #[test]
    fn test_stale_handle_is_an_error() {
        let store = ObjectStore::new();
        assert_eq!(
            store.get_field(&Value::Object(42), &Value::I64(1)),
            Err(StoreError::MissingObject(42))
        );
    }

    #[test]
    fn test_array_dense_growth_and_sparse_spill() {
        let mut array = Array::new();

        array.set(Value::I64(1), Value::I64(10));
        array.set(Value::I64(2), Value::I64(20));
        assert_eq!(array.length(), 2);

        // Small gap: dense prefix extends and pads with Unit
        array.set(Value::I64(5), Value::I64(50));
        assert_eq!(array.length(), 5);
        assert_eq!(array.get(&Value::I64(3)), Some(&Value::Unit));

        // Large gap: spills to the sparse map, dense length unchanged
        array.set(Value::I64(500), Value::I64(77));
        assert_eq!(array.length(), 5);
        assert_eq!(array.get(&Value::I64(500)), Some(&Value::I64(77)));

        // Non-integer key
        array.set(Value::Str("name".into()), Value::Str("veil".into()));
        assert_eq!(
            array.get(&Value::Str("name".into())),
            Some(&Value::Str("veil".into()))
        );
    }

    #[test]
    fn test_handles_are_never_reused() {
        let mut store = ObjectStore::new();
        let first = store.create_object();
        let second = store.create_array();
        let third = store.create_object();

        let handles: Vec<usize> = [first, second, third]
            .iter()
            .map(|value| match value {
                Value::Object(handle) | Value::Array(handle) => *handle,
                _ => unreachable!(),
            })
            .collect();

        assert_eq!(handles, vec![1, 2, 3]);
    }

    #[test]
    fn test_deep_copy_breaks_aliasing() {
        let mut store = ObjectStore::new();
        let inner = store.create_array();
        store
            .set_field(&inner, Value::I64(1), Value::I64(5))
            .unwrap();

        let outer = store.create_object();
        store
            .set_field(&outer, Value::Str("inner".into()), inner.clone())
            .unwrap();

        let copy = store.deep_copy(&outer).unwrap();
        assert_ne!(copy, outer);

        // Mutate the original; the copy must not observe it
        store
            .set_field(&inner, Value::I64(1), Value::I64(99))
            .unwrap();

        let copied_inner = store
            .get_field(&copy, &Value::Str("inner".into()))
            .unwrap();
        assert_eq!(
            store.get_field(&copied_inner, &Value::I64(1)).unwrap(),
            Value::I64(5)
        );
    }

    #[test]
    fn test_foreign_object_roundtrip() {
        let mut storage = ForeignObjectStorage::new();
        let handle = storage.register_object(String::from("host data"));

        let retrieved: Arc<String> = storage.get_object(handle).unwrap();
        assert_eq!(retrieved.as_str(), "host data");

        // Wrong type downcast fails cleanly
        assert!(storage.get_object::<Vec<u8>>(handle).is_none());
        assert!(storage.get_object::<String>(999).is_none());
    }
}
