//! Shared-ownership type-erased values.
//!
//! A `Value` pairs an `Arc`-shared erased payload with its descriptor.
//! Cloning shares the payload; payloads are treated as immutable once
//! stored. The exact-type accessors live here — converter-assisted
//! access is the invoker's job, one level up.

use crate::error::{FlowError, Result};
use crate::types::TypeDescriptor;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased payload carrying its own descriptor.
#[derive(Clone)]
pub struct Value {
    payload: Option<Arc<dyn Any + Send + Sync>>,
    descriptor: TypeDescriptor,
}

impl Value {
    /// The empty value (void descriptor, no payload).
    pub fn empty() -> Self {
        Self {
            payload: None,
            descriptor: TypeDescriptor::void(),
        }
    }

    /// Wrap a concrete payload.
    pub fn new<T: Send + Sync + 'static>(payload: T) -> Self {
        Self {
            payload: Some(Arc::new(payload)),
            descriptor: TypeDescriptor::of::<T>(),
        }
    }

    /// Whether a payload is present.
    pub fn has_value(&self) -> bool {
        self.payload.is_some()
    }

    /// The payload's descriptor (void when empty).
    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    /// Borrow the payload as a concrete type. Exact-type only.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Clone the payload out as a concrete type. Exact-type only;
    /// a mismatch fails with a diagnostic naming both types.
    pub fn cast<T: Clone + 'static>(&self) -> Result<T> {
        self.downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FlowError::TypeMismatch {
                expected: TypeDescriptor::of::<T>().name().to_string(),
                actual: self.descriptor.name().to_string(),
            })
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_value() {
            write!(f, "Value({})", self.descriptor.name())
        } else {
            write!(f, "Value(empty)")
        }
    }
}
