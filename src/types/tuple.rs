//! Tuple type registry.
//!
//! When a component method produces a tuple, downstream nodes usually
//! want a single field of it. Registering the tuple type here records
//! its arity, element descriptors, a type-erased projector (used by
//! projection nodes) and a composer (used by the sync barrier to build
//! tuples from aligned port fronts).
//!
//! Registration is idempotent and happens under a lock; lookups are
//! read-mostly.

use crate::types::{TypeDescriptor, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

type ProjectFn = Arc<dyn Fn(&Value, usize) -> Option<Value> + Send + Sync>;
type ComposeFn = Arc<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

/// Registered facts about one tuple type.
#[derive(Clone)]
pub struct TupleEntry {
    pub tuple: TypeDescriptor,
    pub elements: Vec<TypeDescriptor>,
    pub project: ProjectFn,
    pub compose: ComposeFn,
}

impl TupleEntry {
    pub fn size(&self) -> usize {
        self.elements.len()
    }
}

/// A tuple type that can be registered for projection and composition.
pub trait TupleValue: Send + Sync + Sized + 'static {
    fn element_descriptors() -> Vec<TypeDescriptor>;
    fn project_element(&self, index: usize) -> Option<Value>;
    fn compose_from(values: &[Value]) -> Option<Self>;
}

macro_rules! impl_tuple_value {
    ($( $name:ident : $idx:tt ),+) => {
        impl<$( $name: Clone + Send + Sync + 'static ),+> TupleValue for ($( $name, )+) {
            fn element_descriptors() -> Vec<TypeDescriptor> {
                vec![$( TypeDescriptor::of::<$name>() ),+]
            }

            fn project_element(&self, index: usize) -> Option<Value> {
                match index {
                    $( $idx => Some(Value::new(self.$idx.clone())), )+
                    _ => None,
                }
            }

            fn compose_from(values: &[Value]) -> Option<Self> {
                Some(($( values.get($idx)?.downcast_ref::<$name>()?.clone(), )+))
            }
        }
    };
}

impl_tuple_value!(A: 0, B: 1);
impl_tuple_value!(A: 0, B: 1, C: 2);
impl_tuple_value!(A: 0, B: 1, C: 2, D: 3);

fn registry() -> &'static RwLock<HashMap<TypeId, TupleEntry>> {
    static REGISTRY: OnceLock<RwLock<HashMap<TypeId, TupleEntry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The registry entry a tuple type would register.
pub(crate) fn entry_for<T: TupleValue>() -> TupleEntry {
    TupleEntry {
        tuple: TypeDescriptor::of::<T>(),
        elements: T::element_descriptors(),
        project: Arc::new(|value: &Value, index: usize| {
            value.downcast_ref::<T>().and_then(|t| t.project_element(index))
        }),
        compose: Arc::new(|values: &[Value]| T::compose_from(values).map(Value::new)),
    }
}

/// Register a tuple type. Returns `false` if it was already registered.
pub fn register_tuple<T: TupleValue>() -> bool {
    let descriptor = TypeDescriptor::of::<T>();
    let mut map = registry()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if map.contains_key(&descriptor.index()) {
        return false;
    }
    map.insert(descriptor.index(), entry_for::<T>());
    true
}

/// Look up a registered tuple type.
pub fn tuple_entry(descriptor: &TypeDescriptor) -> Option<TupleEntry> {
    let map = registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    map.get(&descriptor.index()).cloned()
}

/// Arity of a registered tuple type, `0` when unregistered.
pub fn tuple_size(descriptor: &TypeDescriptor) -> usize {
    tuple_entry(descriptor).map(|e| e.size()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        register_tuple::<(u16, u16)>();
        assert!(!register_tuple::<(u16, u16)>());
    }

    #[test]
    fn test_tuple_size() {
        register_tuple::<(i64, String, f64)>();
        let desc = TypeDescriptor::of::<(i64, String, f64)>();
        assert_eq!(tuple_size(&desc), 3);
        assert_eq!(tuple_size(&TypeDescriptor::of::<i64>()), 0);
    }

    #[test]
    fn test_projection() {
        register_tuple::<(i64, String)>();
        let entry = tuple_entry(&TypeDescriptor::of::<(i64, String)>()).unwrap();
        let value = Value::new((7i64, "seven".to_string()));

        let first = (entry.project)(&value, 0).unwrap();
        assert_eq!(first.cast::<i64>().unwrap(), 7);

        let second = (entry.project)(&value, 1).unwrap();
        assert_eq!(second.cast::<String>().unwrap(), "seven");

        assert!((entry.project)(&value, 2).is_none());
    }

    #[test]
    fn test_composition() {
        register_tuple::<(i64, String)>();
        let entry = tuple_entry(&TypeDescriptor::of::<(i64, String)>()).unwrap();

        let parts = [Value::new(3i64), Value::new("three".to_string())];
        let composed = (entry.compose)(&parts).unwrap();
        let tuple = composed.cast::<(i64, String)>().unwrap();
        assert_eq!(tuple, (3, "three".to_string()));

        // Element type mismatch refuses to compose.
        let bad = [Value::new(3i64), Value::new(5i64)];
        assert!((entry.compose)(&bad).is_none());
    }
}
