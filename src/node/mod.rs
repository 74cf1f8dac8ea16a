//! The node model.
//!
//! A node is the runtime shell around a user [`Component`]: it owns the
//! upstream edges, one FIFO buffer per port, per-method configuration,
//! the dispatch order, the lifecycle flag, and the single output slot
//! that downstream nodes read after this node's task completes.
//!
//! Handles are cheap clones of a shared slot; all mutation goes through
//! the handle. During a run, a node's state is only written by its own
//! task — downstream tasks take brief read locks to copy the output
//! packet after the precedence edge has ordered them.

pub mod barrier;
pub(crate) mod dispatch;

use crate::error::{FlowError, Result};
use crate::graph::{ExecutionGraph, FlowControl, TaskId};
use crate::method::{MethodId, MethodRegistry, MethodSignature, ID_CLOSE, ID_FORWARD, ID_OPEN};
use crate::packet::Packet;
use crate::types::{tuple_entry, TupleEntry, TypeDescriptor};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Object-safe access to the concrete component for invoker downcasts.
pub trait AsAny {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A user-defined component: a bag of state plus a reflected method
/// table. The registry is built once per class (typically behind a
/// `OnceLock`) and shared by every instance.
///
/// `bind` runs when the owning node is built into a graph; components
/// that need to signal termination keep the [`FlowControl`].
pub trait Component: AsAny + Send + 'static {
    fn registry(&self) -> Arc<MethodRegistry>;

    fn bind(&mut self, _control: FlowControl) {}
}

/// Per-method, per-node-instance dispatch configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodConfig {
    /// Only fire when every port's front packet carries the same
    /// timestamp; drop strictly older fronts to re-align.
    pub sync: bool,
    /// Port buffer bound for edges carrying this method; `0` means
    /// unbounded. Overflow drops the oldest packet.
    pub max_queue: usize,
}

/// One incoming edge: the upstream node and the method its output feeds.
/// Insertion order defines the port index.
#[derive(Clone)]
pub struct UpstreamEdge {
    pub node: NodeHandle,
    pub method: MethodId,
}

/// Reflected signatures of a node, keyed by method id.
#[derive(Clone, Debug)]
pub struct NodeTypeInfo {
    pub methods: HashMap<MethodId, MethodSignature>,
}

impl NodeTypeInfo {
    pub fn accepts_input(&self, method: MethodId, types: &[TypeDescriptor]) -> bool {
        match self.methods.get(&method) {
            Some(signature) => signature.inputs == types,
            None => false,
        }
    }

    pub fn output_matches(&self, method: MethodId, ty: &TypeDescriptor) -> bool {
        match self.methods.get(&method) {
            Some(signature) => signature.output == *ty,
            None => false,
        }
    }
}

pub(crate) enum NodeKind {
    /// The ordered per-method dispatcher.
    Standard,
    /// N-input timestamp aligner publishing composed tuples.
    Aligned {
        tolerance_ns: u64,
        entry: TupleEntry,
    },
}

pub(crate) struct NodeState {
    pub(crate) component: Box<dyn Component>,
    pub(crate) registry: Arc<MethodRegistry>,
    pub(crate) kind: NodeKind,
    pub(crate) label: String,
    pub(crate) edges: Vec<UpstreamEdge>,
    pub(crate) buffers: Vec<VecDeque<Packet>>,
    pub(crate) configs: HashMap<MethodId, MethodConfig>,
    auto_order: Vec<MethodId>,
    user_order: Option<Vec<MethodId>>,
    opened: bool,
    pub(crate) output: Packet,
    task: Option<TaskId>,
    control: Option<FlowControl>,
}

impl NodeState {
    /// The dispatcher's per-cycle evaluation order; `forward`, when
    /// present, is always last.
    pub(crate) fn effective_order(&self) -> Vec<MethodId> {
        match &self.user_order {
            Some(order) => order.clone(),
            None => self.auto_order.clone(),
        }
    }

    pub(crate) fn config_for(&self, method: MethodId) -> MethodConfig {
        self.configs.get(&method).copied().unwrap_or_default()
    }

    /// A source is a node with no upstreams whose `forward` takes no
    /// arguments.
    pub(crate) fn is_source(&self) -> bool {
        self.edges.is_empty()
            && self
                .registry
                .get(ID_FORWARD)
                .map(|entry| entry.signature.arity() == 0)
                .unwrap_or(false)
    }

    fn push_auto_order(&mut self, method: MethodId) {
        if !self.auto_order.contains(&method) {
            match self.auto_order.iter().position(|&m| m == ID_FORWARD) {
                Some(pos) => self.auto_order.insert(pos, method),
                None => self.auto_order.push(method),
            }
        }
        // "configure first, compute last": forward always goes to the end.
        if let Some(pos) = self.auto_order.iter().position(|&m| m == ID_FORWARD) {
            if pos + 1 != self.auto_order.len() {
                let forward = self.auto_order.remove(pos);
                self.auto_order.push(forward);
            }
        }
    }
}

/// Shared handle to one node instance.
#[derive(Clone)]
pub struct NodeHandle {
    inner: Arc<Mutex<NodeState>>,
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for NodeHandle {}

fn short_type_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

impl NodeHandle {
    /// Wrap a concrete component into a node.
    pub fn new<C: Component>(component: C) -> Self {
        let label = short_type_name(std::any::type_name::<C>()).to_string();
        let registry = component.registry();
        Self::assemble(Box::new(component), registry, label, NodeKind::Standard)
    }

    /// Wrap an already-boxed component, labelled by its registry name.
    pub(crate) fn from_boxed(component: Box<dyn Component>, label: &str) -> Self {
        let registry = component.registry();
        Self::assemble(component, registry, label.to_string(), NodeKind::Standard)
    }

    pub(crate) fn assemble(
        component: Box<dyn Component>,
        registry: Arc<MethodRegistry>,
        label: String,
        kind: NodeKind,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NodeState {
                component,
                registry,
                kind,
                label,
                edges: Vec::new(),
                buffers: Vec::new(),
                configs: HashMap::new(),
                auto_order: Vec::new(),
                user_order: None,
                opened: false,
                output: Packet::empty(),
                task: None,
                control: None,
            })),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, NodeState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Graph integration ──

    /// Register this node's task in the graph and hand the component a
    /// flow control for `stop()`.
    pub fn build(&self, graph: &ExecutionGraph) {
        let task = graph.add_task(self.clone());
        let control = FlowControl::new(graph.stop_flag());
        let mut state = self.state();
        state.task = Some(task);
        state.control = Some(control.clone());
        state.component.bind(control);
    }

    /// Record "upstream runs before me" precedence for every edge.
    /// Every involved node must have been built first.
    pub fn connect(&self, graph: &ExecutionGraph) -> Result<()> {
        let (task, edges) = {
            let state = self.state();
            (state.task, state.edges.clone())
        };
        let task = task.ok_or_else(|| {
            FlowError::Wiring(format!("node '{}' connected before build", self.label()))
        })?;
        for edge in &edges {
            let upstream_task = if edge.node == *self {
                Some(task)
            } else {
                edge.node.task_id()
            };
            match upstream_task {
                Some(upstream) => graph.add_precedence(upstream, task),
                None => {
                    return Err(FlowError::Wiring(format!(
                        "upstream '{}' of '{}' is not built",
                        edge.node.label(),
                        self.label()
                    )))
                }
            }
        }
        Ok(())
    }

    pub(crate) fn task_id(&self) -> Option<TaskId> {
        self.state().task
    }

    pub(crate) fn clear_task(&self) {
        let mut state = self.state();
        state.task = None;
        state.control = None;
    }

    /// Request graph termination; the in-flight cycle completes first.
    pub fn stop(&self) {
        let control = self.state().control.clone();
        match control {
            Some(control) => control.stop(),
            None => tracing::warn!(node = %self.label(), "stop() on a node that is not built"),
        }
    }

    // ── Wiring ──

    fn add_edge(&self, upstream: &NodeHandle, method: MethodId) {
        let mut state = self.state();
        state.edges.push(UpstreamEdge {
            node: upstream.clone(),
            method,
        });
        state.buffers.push(VecDeque::new());
        state.push_auto_order(method);
    }

    /// Feed this node's `forward` port from `upstream`.
    pub fn set_input(&self, upstream: &NodeHandle) {
        self.add_edge(upstream, ID_FORWARD);
    }

    /// Feed the named method's next port from `upstream`. An empty name
    /// or `"forward"` is equivalent to [`set_input`](Self::set_input).
    pub fn set_input_for(&self, method: &str, upstream: &NodeHandle) {
        if method.is_empty() || method == "forward" {
            self.set_input(upstream);
            return;
        }
        self.add_edge(upstream, MethodId::of(method));
    }

    /// Reset all edges, buffers, and the auto-derived method order. A
    /// user-set order is preserved.
    pub fn clear_upstreams(&self) {
        let mut state = self.state();
        state.edges.clear();
        state.buffers.clear();
        state.auto_order.clear();
    }

    /// Override the dispatch order. `forward` is forced last.
    pub fn set_method_order(&self, methods: &[&str]) {
        let mut order: Vec<MethodId> = methods.iter().map(|m| MethodId::of(m)).collect();
        let had_forward = order.contains(&ID_FORWARD);
        order.retain(|&m| m != ID_FORWARD);
        if had_forward {
            order.push(ID_FORWARD);
        }
        self.state().user_order = Some(order);
    }

    /// Enable timestamp-equality gating for the named method.
    pub fn set_method_sync(&self, method: &str, enabled: bool) {
        let mut state = self.state();
        state
            .configs
            .entry(MethodId::of(method))
            .or_default()
            .sync = enabled;
    }

    /// Bound the port buffers of edges carrying the named method;
    /// overflow drops the oldest packet. `0` means unbounded.
    pub fn set_method_queue_size(&self, method: &str, max_queue: usize) {
        let mut state = self.state();
        state
            .configs
            .entry(MethodId::of(method))
            .or_default()
            .max_queue = max_queue;
    }

    // ── Lifecycle ──

    /// Run the `Open` hook if the component has one; idempotent.
    pub fn open(&self, args: &[Packet]) -> Result<()> {
        let mut state = self.state();
        if state.opened {
            return Ok(());
        }
        let registry = state.registry.clone();
        if let Some(entry) = registry.get(ID_OPEN) {
            let label = state.label.clone();
            dispatch::call_entry_caught(entry, (*state.component).as_any_mut(), args).map_err(
                |e| FlowError::Lifecycle {
                    node: label,
                    message: e.to_string(),
                },
            )?;
        }
        state.opened = true;
        Ok(())
    }

    /// Run the `Close` hook if the component has one; idempotent.
    pub fn close(&self, args: &[Packet]) -> Result<()> {
        let mut state = self.state();
        if !state.opened {
            return Ok(());
        }
        let registry = state.registry.clone();
        if let Some(entry) = registry.get(ID_CLOSE) {
            let label = state.label.clone();
            dispatch::call_entry_caught(entry, (*state.component).as_any_mut(), args).map_err(
                |e| FlowError::Lifecycle {
                    node: label,
                    message: e.to_string(),
                },
            )?;
        }
        state.opened = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state().opened
    }

    /// One-shot synchronous call bypassing the dispatcher; used for
    /// scripting-style embedding and tests.
    pub fn invoke(&self, method: &str, inputs: &[Packet]) -> Result<Packet> {
        let id = MethodId::of(method);
        let mut state = self.state();
        let registry = state.registry.clone();
        let entry = registry
            .get(id)
            .ok_or_else(|| FlowError::MethodNotFound(method.to_string()))?;
        dispatch::call_entry_caught(entry, (*state.component).as_any_mut(), inputs)
    }

    // ── Introspection ──

    pub fn label(&self) -> String {
        self.state().label.clone()
    }

    pub fn type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            methods: self.state().registry.signatures(),
        }
    }

    pub fn exposed_methods(&self) -> Vec<String> {
        self.state().registry.exposed_methods()
    }

    pub fn upstreams(&self) -> Vec<NodeHandle> {
        self.state().edges.iter().map(|e| e.node.clone()).collect()
    }

    /// The packet published in the most recent cycle (empty between
    /// runs and on non-producing cycles).
    pub fn last_output(&self) -> Packet {
        self.state().output.clone()
    }

    /// Buffer depth per port, in port order.
    pub fn port_depths(&self) -> Vec<usize> {
        self.state().buffers.iter().map(|b| b.len()).collect()
    }

    /// Buffered packets on one port, front first.
    pub fn buffered(&self, port: usize) -> Vec<Packet> {
        self.state()
            .buffers
            .get(port)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn edges_snapshot(&self) -> Vec<UpstreamEdge> {
        self.state().edges.clone()
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeHandle({})", self.label())
    }
}

/// Build a projection node for element `index` of a registered tuple
/// type: a 1-input node whose `forward(tuple)` returns the element.
pub fn projection_node(tuple: &TypeDescriptor, index: usize) -> Result<NodeHandle> {
    let entry = tuple_entry(tuple).ok_or_else(|| {
        FlowError::Wiring(format!("tuple type {} is not registered", tuple.name()))
    })?;
    if index >= entry.size() {
        return Err(FlowError::Wiring(format!(
            "tuple index {} out of range for {} (size {})",
            index,
            tuple.name(),
            entry.size()
        )));
    }

    let signature = MethodSignature {
        inputs: vec![entry.tuple],
        output: entry.elements[index],
    };
    let tuple_desc = entry.tuple;
    let project = entry.project.clone();
    let invoker: Arc<crate::method::InvokerFn> = Arc::new(move |_target, inputs| {
        if inputs.len() != 1 {
            return Err(FlowError::Arity {
                method: "forward".to_string(),
                expected: 1,
                got: inputs.len(),
            });
        }
        project(inputs[0].value(), index)
            .map(|value| Packet::from_value(value, 0))
            .ok_or_else(|| FlowError::TypeMismatch {
                expected: tuple_desc.name().to_string(),
                actual: inputs[0].descriptor().name().to_string(),
            })
    });
    let registry = Arc::new(MethodRegistry::single_raw("forward", signature, invoker));

    struct TupleProjection {
        registry: Arc<MethodRegistry>,
    }

    impl Component for TupleProjection {
        fn registry(&self) -> Arc<MethodRegistry> {
            self.registry.clone()
        }
    }

    let label = format!("TupleProjection[{index}]");
    let registry_for_node = registry.clone();
    Ok(NodeHandle::assemble(
        Box::new(TupleProjection { registry }),
        registry_for_node,
        label,
        NodeKind::Standard,
    ))
}
