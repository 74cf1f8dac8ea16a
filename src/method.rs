//! Method identity, signatures, and type-erased invokers.
//!
//! Each component class exposes a [`MethodRegistry`]: a table mapping
//! `MethodId` (FNV-1a of the method name) to a signature and an erased
//! invoker closure. The registry is built once per class through the
//! arity-typed builder — one small factory per exposed method — and is
//! immutable afterwards.
//!
//! The invoker is the only place the converter registry is consulted:
//! each argument is first downcast exactly, then run through
//! [`converters`](crate::types::converters). Two conveniences fall out of
//! the erasure layer: a parameter declared as [`Packet`] receives the
//! whole packet (payload and timestamp), and a method returning a
//! [`Packet`] controls its own timestamp instead of being stamped by the
//! dispatcher.

use crate::error::{FlowError, Result};
use crate::packet::Packet;
use crate::types::{converters, TypeDescriptor};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// FNV-1a over the method name, matching the registry's compile-time ids.
pub const fn fnv1a(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

/// Identity of a method within a component class.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub u64);

impl MethodId {
    pub const fn of(name: &str) -> Self {
        Self(fnv1a(name))
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({:#018x})", self.0)
    }
}

/// The primary compute method; always last in the dispatch order.
pub const ID_FORWARD: MethodId = MethodId::of("forward");
/// Lifecycle enter hook.
pub const ID_OPEN: MethodId = MethodId::of("Open");
/// Lifecycle exit hook.
pub const ID_CLOSE: MethodId = MethodId::of("Close");

/// Ordered input descriptors and one output descriptor (void for `()`).
#[derive(Clone, Debug)]
pub struct MethodSignature {
    pub inputs: Vec<TypeDescriptor>,
    pub output: TypeDescriptor,
}

impl MethodSignature {
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }
}

pub(crate) type InvokerFn = dyn Fn(&mut dyn Any, &[Packet]) -> Result<Packet> + Send + Sync;

/// One reflected method: name, signature, and the erased invoker.
#[derive(Clone)]
pub struct MethodEntry {
    pub name: String,
    pub signature: MethodSignature,
    pub(crate) invoker: Arc<InvokerFn>,
}

impl MethodEntry {
    pub(crate) fn invoke(&self, target: &mut dyn Any, inputs: &[Packet]) -> Result<Packet> {
        (self.invoker)(target, inputs)
    }
}

/// Per-component-class table `MethodId → entry`.
pub struct MethodRegistry {
    entries: HashMap<MethodId, MethodEntry>,
    order: Vec<MethodId>,
}

impl MethodRegistry {
    /// Start a registry for component type `C`.
    pub fn builder<C: Any>() -> MethodRegistryBuilder<C> {
        MethodRegistryBuilder {
            entries: HashMap::new(),
            order: Vec::new(),
            _component: std::marker::PhantomData,
        }
    }

    /// Registry with a single pre-erased entry; used for synthesized
    /// nodes (tuple projections, barriers) whose signatures are only
    /// known at runtime.
    pub(crate) fn single_raw(
        name: &str,
        signature: MethodSignature,
        invoker: Arc<InvokerFn>,
    ) -> Self {
        let id = MethodId::of(name);
        let mut entries = HashMap::new();
        entries.insert(
            id,
            MethodEntry {
                name: name.to_string(),
                signature,
                invoker,
            },
        );
        Self {
            entries,
            order: vec![id],
        }
    }

    pub fn get(&self, id: MethodId) -> Option<&MethodEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: MethodId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Method names in registration order.
    pub fn exposed_methods(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| e.name.clone()))
            .collect()
    }

    /// Signatures keyed by method id.
    pub fn signatures(&self) -> HashMap<MethodId, MethodSignature> {
        self.entries
            .iter()
            .map(|(id, e)| (*id, e.signature.clone()))
            .collect()
    }
}

/// Extraction of one typed argument from a packet.
///
/// The blanket impl covers every clonable payload type: exact downcast
/// first, converter registry second. Declaring the parameter as
/// [`Packet`] hands the method the whole packet instead.
pub trait PacketArg: Sized + 'static {
    fn descriptor() -> TypeDescriptor;
    fn from_packet(packet: &Packet) -> Result<Self>;
}

impl<T: Clone + Send + Sync + 'static> PacketArg for T {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<T>()
    }

    fn from_packet(packet: &Packet) -> Result<Self> {
        if TypeId::of::<T>() == TypeId::of::<Packet>() {
            let mut slot = Some(packet.clone());
            if let Some(typed) = (&mut slot as &mut dyn Any).downcast_mut::<Option<T>>() {
                if let Some(whole) = typed.take() {
                    return Ok(whole);
                }
            }
        }
        if let Some(exact) = packet.value().downcast_ref::<T>() {
            return Ok(exact.clone());
        }
        converters()
            .convert_to::<T>(packet.value())
            .ok_or_else(|| FlowError::TypeMismatch {
                expected: TypeDescriptor::of::<T>().name().to_string(),
                actual: packet.descriptor().name().to_string(),
            })
    }
}

/// Wrapping of a method's return value into a packet.
///
/// `()` becomes the empty packet; a returned [`Packet`] passes through
/// unchanged (keeping its timestamp); everything else becomes an
/// unstamped packet for the dispatcher to stamp.
pub trait IntoOutput: 'static {
    fn descriptor() -> TypeDescriptor;
    fn into_packet(self) -> Packet;
}

impl<T: Send + Sync + 'static> IntoOutput for T {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<T>()
    }

    fn into_packet(self) -> Packet {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return Packet::empty();
        }
        let mut slot = Some(self);
        if TypeId::of::<T>() == TypeId::of::<Packet>() {
            if let Some(passthrough) = (&mut slot as &mut dyn Any).downcast_mut::<Option<Packet>>()
            {
                if let Some(packet) = passthrough.take() {
                    return packet;
                }
            }
        }
        match slot {
            Some(payload) => Packet::from(payload, 0),
            None => Packet::empty(),
        }
    }
}

fn component_of<'a, C: Any>(target: &'a mut dyn Any, method: &str) -> Result<&'a mut C> {
    target
        .downcast_mut::<C>()
        .ok_or_else(|| FlowError::Invocation {
            method: method.to_string(),
            message: "invoker bound to a different component type".to_string(),
        })
}

fn check_arity(method: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(FlowError::Arity {
            method: method.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

/// Builder producing one invoker factory per arity.
pub struct MethodRegistryBuilder<C> {
    entries: HashMap<MethodId, MethodEntry>,
    order: Vec<MethodId>,
    _component: std::marker::PhantomData<fn(&mut C)>,
}

impl<C: Any> MethodRegistryBuilder<C> {
    fn insert(&mut self, name: &'static str, signature: MethodSignature, invoker: Arc<InvokerFn>) {
        let id = MethodId::of(name);
        self.order.push(id);
        self.entries.insert(
            id,
            MethodEntry {
                name: name.to_string(),
                signature,
                invoker,
            },
        );
    }

    /// A zero-argument method. Zero-argument `forward` marks a source.
    pub fn method0<R, F>(mut self, name: &'static str, f: F) -> Self
    where
        R: IntoOutput,
        F: Fn(&mut C) -> R + Send + Sync + 'static,
    {
        let signature = MethodSignature {
            inputs: Vec::new(),
            output: R::descriptor(),
        };
        let invoker: Arc<InvokerFn> = Arc::new(move |target, inputs| {
            let component = component_of::<C>(target, name)?;
            check_arity(name, 0, inputs.len())?;
            Ok(f(component).into_packet())
        });
        self.insert(name, signature, invoker);
        self
    }

    /// A one-argument method.
    pub fn method1<A, R, F>(mut self, name: &'static str, f: F) -> Self
    where
        A: PacketArg,
        R: IntoOutput,
        F: Fn(&mut C, A) -> R + Send + Sync + 'static,
    {
        let signature = MethodSignature {
            inputs: vec![A::descriptor()],
            output: R::descriptor(),
        };
        let invoker: Arc<InvokerFn> = Arc::new(move |target, inputs| {
            let component = component_of::<C>(target, name)?;
            check_arity(name, 1, inputs.len())?;
            let a = A::from_packet(&inputs[0])?;
            Ok(f(component, a).into_packet())
        });
        self.insert(name, signature, invoker);
        self
    }

    /// A two-argument method.
    pub fn method2<A, B, R, F>(mut self, name: &'static str, f: F) -> Self
    where
        A: PacketArg,
        B: PacketArg,
        R: IntoOutput,
        F: Fn(&mut C, A, B) -> R + Send + Sync + 'static,
    {
        let signature = MethodSignature {
            inputs: vec![A::descriptor(), B::descriptor()],
            output: R::descriptor(),
        };
        let invoker: Arc<InvokerFn> = Arc::new(move |target, inputs| {
            let component = component_of::<C>(target, name)?;
            check_arity(name, 2, inputs.len())?;
            let a = A::from_packet(&inputs[0])?;
            let b = B::from_packet(&inputs[1])?;
            Ok(f(component, a, b).into_packet())
        });
        self.insert(name, signature, invoker);
        self
    }

    /// A three-argument method.
    pub fn method3<A, B, D, R, F>(mut self, name: &'static str, f: F) -> Self
    where
        A: PacketArg,
        B: PacketArg,
        D: PacketArg,
        R: IntoOutput,
        F: Fn(&mut C, A, B, D) -> R + Send + Sync + 'static,
    {
        let signature = MethodSignature {
            inputs: vec![A::descriptor(), B::descriptor(), D::descriptor()],
            output: R::descriptor(),
        };
        let invoker: Arc<InvokerFn> = Arc::new(move |target, inputs| {
            let component = component_of::<C>(target, name)?;
            check_arity(name, 3, inputs.len())?;
            let a = A::from_packet(&inputs[0])?;
            let b = B::from_packet(&inputs[1])?;
            let d = D::from_packet(&inputs[2])?;
            Ok(f(component, a, b, d).into_packet())
        });
        self.insert(name, signature, invoker);
        self
    }

    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            entries: self.entries,
            order: self.order,
        }
    }
}
