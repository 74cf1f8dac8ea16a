//! The process-wide type converter registry.
//!
//! Converters map one payload type to another and are consulted by the
//! method invoker when an exact downcast fails. Registration happens
//! under a write lock; lookups are read-mostly. The registry pre-seeds
//! every ordered pair among the arithmetic types `{i32, i64, f32, f64}`
//! — widenings are lossless, narrowings truncate (they never error).
//!
//! A host-language binding attaches by registering `foreign → T` and
//! `T → foreign` pairs here; the core never names the host language.

use crate::types::{TypeDescriptor, Value};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

type ConvertFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Lookup table `(from, to) → converter`.
pub struct ConverterRegistry {
    converters: RwLock<HashMap<(TypeId, TypeId), ConvertFn>>,
}

/// The process-wide registry, seeded with arithmetic conversions.
pub fn converters() -> &'static ConverterRegistry {
    static REGISTRY: OnceLock<ConverterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = ConverterRegistry {
            converters: RwLock::new(HashMap::new()),
        };
        register_arithmetic_conversions(&registry);
        registry
    })
}

impl ConverterRegistry {
    /// Register a converter from `F` to `T`. Later registrations for the
    /// same pair replace earlier ones.
    pub fn register<F, T, C>(&self, convert: C)
    where
        F: Send + Sync + 'static,
        T: Send + Sync + 'static,
        C: Fn(&F) -> T + Send + Sync + 'static,
    {
        let key = (TypeId::of::<F>(), TypeId::of::<T>());
        let erased: ConvertFn = Arc::new(move |value: &Value| {
            value.downcast_ref::<F>().map(|v| Value::new(convert(v)))
        });
        let mut map = self
            .converters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(key, erased);
    }

    /// Convert `value` to the target descriptor. `None` means no
    /// converter is registered for the pair (or the payload did not
    /// match its own descriptor, which callers treat the same way).
    pub fn convert(&self, value: &Value, to: &TypeDescriptor) -> Option<Value> {
        let key = (value.descriptor().index(), to.index());
        let converter = {
            let map = self
                .converters
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.get(&key).cloned()
        };
        converter.and_then(|f| f(value))
    }

    /// Convert and extract in one step.
    pub fn convert_to<T: Clone + Send + Sync + 'static>(&self, value: &Value) -> Option<T> {
        self.convert(value, &TypeDescriptor::of::<T>())
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Whether a converter exists for the pair.
    pub fn has_converter(&self, from: &TypeDescriptor, to: &TypeDescriptor) -> bool {
        let map = self
            .converters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.contains_key(&(from.index(), to.index()))
    }
}

macro_rules! register_numeric {
    ($registry:expr, $( ($from:ty, $to:ty) ),+ $(,)?) => {
        $( $registry.register(|v: &$from| *v as $to); )+
    };
}

fn register_arithmetic_conversions(registry: &ConverterRegistry) {
    register_numeric!(
        registry,
        (i32, i64),
        (i32, f32),
        (i32, f64),
        (i64, i32),
        (i64, f32),
        (i64, f64),
        (f32, i32),
        (f32, i64),
        (f32, f64),
        (f64, i32),
        (f64, i64),
        (f64, f32),
    );
}
