//! The node registry — constructing nodes by name.
//!
//! Each registration carries an ordered list of named arguments with
//! defaults. At construction time an argument is resolved positionally
//! first, then by name, then from its default; the resolved value is
//! cast to the default's type through the converter registry, falling
//! back to the default when the cast misses. The global registry is
//! seeded with the reference component library.

use crate::error::{FlowError, Result};
use crate::node::{Component, NodeHandle};
use crate::types::{converters, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// A named constructor argument with its default value.
#[derive(Clone)]
pub struct Arg {
    name: &'static str,
    default: Value,
}

impl Arg {
    pub fn new<T: Send + Sync + 'static>(name: &'static str, default: T) -> Self {
        Self {
            name,
            default: Value::new(default),
        }
    }
}

/// Positional and named argument values for one construction.
#[derive(Clone, Default)]
pub struct ArgBag {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl ArgBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.positional.push(Value::new(value));
        self
    }

    /// Set a named argument.
    pub fn kwarg<T: Send + Sync + 'static>(mut self, name: &str, value: T) -> Self {
        self.named.insert(name.to_string(), Value::new(value));
        self
    }
}

/// Arguments after positional/named/default resolution, keyed by name.
pub struct ResolvedArgs {
    node: String,
    values: HashMap<&'static str, Value>,
}

impl ResolvedArgs {
    /// Extract one argument; exact type first, converter second.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| FlowError::Construction {
                node: self.node.clone(),
                message: format!("no argument named '{name}'"),
            })?;
        if let Some(exact) = value.downcast_ref::<T>() {
            return Ok(exact.clone());
        }
        converters()
            .convert_to::<T>(value)
            .ok_or_else(|| FlowError::Construction {
                node: self.node.clone(),
                message: format!(
                    "argument '{name}' of type {} cannot become the requested type",
                    value.descriptor().name()
                ),
            })
    }
}

type Constructor = Arc<dyn Fn(&ResolvedArgs) -> Result<Box<dyn Component>> + Send + Sync>;

struct Registration {
    args: Vec<Arg>,
    construct: Constructor,
}

/// Process-wide mapping `name → constructor`.
pub struct NodeRegistry {
    registrations: RwLock<HashMap<String, Registration>>,
}

/// The global registry, seeded with the reference components.
pub fn global() -> &'static NodeRegistry {
    static REGISTRY: OnceLock<NodeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = NodeRegistry {
            registrations: RwLock::new(HashMap::new()),
        };
        crate::components::register_defaults(&registry);
        registry
    })
}

/// Construct a registered node by name.
pub fn create_node(name: &str, args: &ArgBag) -> Result<NodeHandle> {
    global().create(name, args)
}

impl NodeRegistry {
    /// Register a constructor under `name`. Later registrations replace
    /// earlier ones.
    pub fn register<F>(&self, name: &str, args: Vec<Arg>, construct: F)
    where
        F: Fn(&ResolvedArgs) -> Result<Box<dyn Component>> + Send + Sync + 'static,
    {
        let mut map = self
            .registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(
            name.to_string(),
            Registration {
                args,
                construct: Arc::new(construct),
            },
        );
    }

    /// Construct a node. Argument resolution per slot: positional index,
    /// else named lookup, else the registered default. Values that
    /// cannot be cast to the default's type fall back to the default.
    pub fn create(&self, name: &str, bag: &ArgBag) -> Result<NodeHandle> {
        let map = self
            .registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let registration = map
            .get(name)
            .ok_or_else(|| FlowError::UnknownNode(name.to_string()))?;

        let mut values = HashMap::new();
        for (index, spec) in registration.args.iter().enumerate() {
            let supplied = bag
                .positional
                .get(index)
                .or_else(|| bag.named.get(spec.name));
            let resolved = match supplied {
                Some(value) => coerce_to_default(value, &spec.default),
                None => spec.default.clone(),
            };
            values.insert(spec.name, resolved);
        }

        let resolved = ResolvedArgs {
            node: name.to_string(),
            values,
        };
        let component = (registration.construct)(&resolved)?;
        Ok(NodeHandle::from_boxed(component, name))
    }

    /// Names of all registered node types, sorted.
    pub fn registered(&self) -> Vec<String> {
        let map = self
            .registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        let map = self
            .registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.contains_key(name)
    }
}

/// Cast a supplied value to the default's type; on a miss the default
/// is substituted.
fn coerce_to_default(supplied: &Value, default: &Value) -> Value {
    if supplied.descriptor() == default.descriptor() {
        return supplied.clone();
    }
    match converters().convert(supplied, &default.descriptor()) {
        Some(converted) => converted,
        None => {
            tracing::warn!(
                supplied = supplied.descriptor().name(),
                expected = default.descriptor().name(),
                "argument cast failed, default substituted"
            );
            default.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_node() {
        let err = create_node("NoSuchNode", &ArgBag::new()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownNode(_)));
    }

    #[test]
    fn test_defaults_registered() {
        let names = global().registered();
        assert!(names.iter().any(|n| n == "NumberSource"));
        assert!(global().is_registered("MultiplyBy"));
        assert!(!global().is_registered("Camera"));
    }

    #[test]
    fn test_positional_and_named_args() {
        // NumberSource(start, max, step) with max given by name.
        let node = create_node(
            "NumberSource",
            &ArgBag::new().arg(5i64).kwarg("max", 7i64),
        )
        .unwrap();
        let out = node.invoke("forward", &[]).unwrap();
        assert_eq!(out.cast::<i64>().unwrap(), 5);
    }

    #[test]
    fn test_arg_conversion_through_registry() {
        // i32 arguments convert to the declared i64 defaults.
        let node = create_node("MultiplyBy", &ArgBag::new().arg(3i32)).unwrap();
        let out = node.invoke("forward", &[crate::packet::Packet::from(4i64, 0)]).unwrap();
        assert_eq!(out.cast::<i64>().unwrap(), 12);
    }

    #[test]
    fn test_uncastable_arg_falls_back_to_default() {
        // A string where a factor is expected: the default (2) applies.
        let node = create_node(
            "MultiplyBy",
            &ArgBag::new().arg("not a number".to_string()),
        )
        .unwrap();
        let out = node.invoke("forward", &[crate::packet::Packet::from(4i64, 0)]).unwrap();
        assert_eq!(out.cast::<i64>().unwrap(), 8);
    }

    #[test]
    fn test_label_is_registered_name() {
        let node = create_node("IntToText", &ArgBag::new()).unwrap();
        assert_eq!(node.label(), "IntToText");
    }
}
