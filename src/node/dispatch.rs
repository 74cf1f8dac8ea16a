//! The per-cycle dispatcher.
//!
//! Each cycle a node task: (1) appends every non-empty upstream output
//! to its port buffer, enforcing the per-method queue bound; (2) walks
//! the effective method order, gating each method by strict arity, the
//! sync policy, and buffer availability; (3) pops one packet per port,
//! invokes the method, and publishes the result into the node's single
//! output slot. A cycle in which no method produces publishes the empty
//! packet — stale output is never re-forwarded.
//!
//! Failures inside a method (cast miss, panic) are contained: logged,
//! the invocation dropped, and the cycle continues.

use super::{NodeHandle, NodeKind, NodeState};
use crate::error::{FlowError, Result};
use crate::method::{MethodEntry, ID_FORWARD};
use crate::packet::{now_ns, Packet};
use crate::types::{TupleEntry, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run one node task: gather upstream outputs, then step the dispatcher.
///
/// Gathering takes no nested locks — each upstream is locked briefly and
/// released before the node's own state is locked for the step.
pub(crate) fn run_cycle(handle: &NodeHandle) {
    let edges = handle.edges_snapshot();
    let inputs: Vec<Packet> = edges.iter().map(|edge| edge.node.last_output()).collect();
    handle.state().step(&inputs);
}

/// Invoke a method entry, containing panics from user code.
pub(crate) fn call_entry_caught(
    entry: &MethodEntry,
    target: &mut dyn Any,
    inputs: &[Packet],
) -> Result<Packet> {
    match catch_unwind(AssertUnwindSafe(|| entry.invoke(target, inputs))) {
        Ok(result) => result,
        Err(payload) => Err(FlowError::Invocation {
            method: entry.name.clone(),
            message: panic_message(payload),
        }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "component method panicked".to_string()
    }
}

impl NodeState {
    pub(crate) fn step(&mut self, upstream_outputs: &[Packet]) {
        let aligned = match &self.kind {
            NodeKind::Aligned {
                tolerance_ns,
                entry,
            } => Some((*tolerance_ns, entry.clone())),
            NodeKind::Standard => None,
        };
        if let Some((tolerance_ns, entry)) = aligned {
            self.aligned_step(upstream_outputs, tolerance_ns, &entry);
        } else if self.is_source() {
            self.source_step();
        } else {
            self.dispatch_step(upstream_outputs);
        }
    }

    /// Append non-empty upstream outputs to the port buffers, bounded by
    /// the carrying method's `max_queue`.
    fn buffer_inputs(&mut self, upstream_outputs: &[Packet]) {
        let ports = self.edges.len().min(upstream_outputs.len());
        for port in 0..ports {
            let packet = &upstream_outputs[port];
            if !packet.has_value() {
                continue;
            }
            let cap = self.config_for(self.edges[port].method).max_queue;
            let buffer = &mut self.buffers[port];
            buffer.push_back(packet.clone());
            if cap > 0 {
                while buffer.len() > cap {
                    buffer.pop_front();
                    tracing::trace!(node = %self.label, port, "queue full, dropped oldest packet");
                }
            }
        }
    }

    fn dispatch_step(&mut self, upstream_outputs: &[Packet]) {
        self.buffer_inputs(upstream_outputs);

        let registry = self.registry.clone();
        let mut produced = false;

        for method in self.effective_order() {
            let Some(entry) = registry.get(method) else {
                continue;
            };
            let ports: Vec<usize> = self
                .edges
                .iter()
                .enumerate()
                .filter(|(_, edge)| edge.method == method)
                .map(|(port, _)| port)
                .collect();
            // Strict arity: the wired port count must match the signature.
            if ports.len() != entry.signature.arity() {
                continue;
            }

            if self.config_for(method).sync && !self.sync_frontier_ready(&ports) {
                continue;
            }
            if ports.iter().any(|&port| self.buffers[port].is_empty()) {
                continue;
            }

            let mut inputs = Vec::with_capacity(ports.len());
            for &port in &ports {
                if let Some(packet) = self.buffers[port].pop_front() {
                    inputs.push(packet);
                }
            }
            if inputs.len() != ports.len() {
                continue;
            }

            match call_entry_caught(entry, (*self.component).as_any_mut(), &inputs) {
                Ok(mut output) if output.has_value() => {
                    if output.timestamp_ns() == 0 {
                        if let Some(first) = inputs.first() {
                            output.set_timestamp(first.timestamp_ns());
                        }
                    }
                    self.output = output;
                    produced = true;
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        node = %self.label,
                        method = %entry.name,
                        %error,
                        "method invocation failed, output dropped this cycle"
                    );
                }
            }
        }

        if !produced {
            self.output = Packet::empty();
        }
    }

    /// Sync gate: every port non-empty and every front packet on the
    /// same timestamp. On divergence, fronts at the minimum timestamp
    /// are dropped so the frontier can re-align next cycle.
    fn sync_frontier_ready(&mut self, ports: &[usize]) -> bool {
        if ports.is_empty() {
            return true;
        }
        if ports.iter().any(|&port| self.buffers[port].is_empty()) {
            return false;
        }
        let mut min_ts = u64::MAX;
        let mut max_ts = 0u64;
        for &port in ports {
            let ts = self.buffers[port]
                .front()
                .map(|p| p.timestamp_ns())
                .unwrap_or(0);
            min_ts = min_ts.min(ts);
            max_ts = max_ts.max(ts);
        }
        if min_ts == max_ts {
            return true;
        }
        for &port in ports {
            let stale = self.buffers[port]
                .front()
                .map(|p| p.timestamp_ns() == min_ts)
                .unwrap_or(false);
            if stale {
                self.buffers[port].pop_front();
                tracing::debug!(node = %self.label, port, min_ts, max_ts, "sync drop of stale packet");
            }
        }
        false
    }

    /// Sources invoke `forward` with no inputs; unstamped results get a
    /// fresh monotonic timestamp.
    fn source_step(&mut self) {
        let registry = self.registry.clone();
        let Some(entry) = registry.get(ID_FORWARD) else {
            self.output = Packet::empty();
            return;
        };
        match call_entry_caught(entry, (*self.component).as_any_mut(), &[]) {
            Ok(mut output) => {
                if output.has_value() && output.timestamp_ns() == 0 {
                    output.set_timestamp(now_ns());
                }
                self.output = output;
            }
            Err(error) => {
                tracing::warn!(node = %self.label, %error, "source invocation failed");
                self.output = Packet::empty();
            }
        }
    }

    /// Barrier step: buffer inputs, then repeatedly either publish an
    /// aligned tuple (timestamps within the tolerance window, stamped
    /// with the newest) or drop the oldest frontier packets.
    fn aligned_step(
        &mut self,
        upstream_outputs: &[Packet],
        tolerance_ns: u64,
        entry: &TupleEntry,
    ) {
        self.buffer_inputs(upstream_outputs);

        let mut published: Option<Packet> = None;
        if self.buffers.len() == entry.size() {
            loop {
                if self.buffers.iter().any(|b| b.is_empty()) {
                    break;
                }
                let mut min_ts = u64::MAX;
                let mut max_ts = 0u64;
                for buffer in &self.buffers {
                    let ts = buffer.front().map(|p| p.timestamp_ns()).unwrap_or(0);
                    min_ts = min_ts.min(ts);
                    max_ts = max_ts.max(ts);
                }
                if max_ts - min_ts <= tolerance_ns {
                    let fronts: Vec<Value> = self
                        .buffers
                        .iter()
                        .filter_map(|b| b.front().map(|p| p.value().clone()))
                        .collect();
                    for buffer in &mut self.buffers {
                        buffer.pop_front();
                    }
                    match (entry.compose)(&fronts) {
                        Some(tuple) => published = Some(Packet::from_value(tuple, max_ts)),
                        None => tracing::warn!(
                            node = %self.label,
                            tuple = entry.tuple.name(),
                            "barrier inputs did not match tuple element types"
                        ),
                    }
                } else {
                    for buffer in &mut self.buffers {
                        let stale = buffer
                            .front()
                            .map(|p| p.timestamp_ns() == min_ts)
                            .unwrap_or(false);
                        if stale {
                            buffer.pop_front();
                            tracing::debug!(node = %self.label, min_ts, max_ts, "barrier drop of stale packet");
                        }
                    }
                }
            }
        }

        self.output = match published {
            Some(packet) => packet,
            None => Packet::empty(),
        };
    }
}

#[cfg(test)]
mod tests {
    use crate::method::MethodRegistry;
    use crate::node::{Component, NodeHandle};
    use crate::packet::Packet;
    use std::sync::{Arc, OnceLock};

    struct Summer {
        total: i64,
    }

    impl Component for Summer {
        fn registry(&self) -> Arc<MethodRegistry> {
            static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
            REGISTRY
                .get_or_init(|| {
                    Arc::new(
                        MethodRegistry::builder::<Summer>()
                            .method2("forward", |s: &mut Summer, a: i64, b: i64| {
                                s.total += a + b;
                                s.total
                            })
                            .build(),
                    )
                })
                .clone()
        }
    }

    fn step(node: &NodeHandle, inputs: &[Packet]) {
        node.state().step(inputs);
    }

    struct Feeder;

    impl Component for Feeder {
        fn registry(&self) -> Arc<MethodRegistry> {
            static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
            REGISTRY
                .get_or_init(|| {
                    Arc::new(
                        MethodRegistry::builder::<Feeder>()
                            .method1("forward", |_: &mut Feeder, x: i64| x)
                            .build(),
                    )
                })
                .clone()
        }
    }

    fn two_port_summer() -> NodeHandle {
        let node = NodeHandle::new(Summer { total: 0 });
        let a = NodeHandle::new(Feeder);
        let b = NodeHandle::new(Feeder);
        node.set_input(&a);
        node.set_input(&b);
        node
    }

    #[test]
    fn test_dispatch_consumes_one_packet_per_port() {
        let node = two_port_summer();
        step(
            &node,
            &[Packet::from(1i64, 10), Packet::from(2i64, 10)],
        );
        assert_eq!(node.last_output().cast::<i64>().unwrap(), 3);
        assert_eq!(node.port_depths(), vec![0, 0]);
    }

    #[test]
    fn test_result_inherits_first_input_timestamp() {
        let node = two_port_summer();
        step(
            &node,
            &[Packet::from(1i64, 42), Packet::from(2i64, 99)],
        );
        assert_eq!(node.last_output().timestamp_ns(), 42);
    }

    #[test]
    fn test_missing_port_data_skips_and_buffers() {
        let node = two_port_summer();
        step(&node, &[Packet::from(1i64, 1), Packet::empty()]);
        // Gated: one port empty, nothing produced, input retained.
        assert!(!node.last_output().has_value());
        assert_eq!(node.port_depths(), vec![1, 0]);

        step(&node, &[Packet::empty(), Packet::from(2i64, 2)]);
        assert_eq!(node.last_output().cast::<i64>().unwrap(), 3);
        assert_eq!(node.port_depths(), vec![0, 0]);
    }

    #[test]
    fn test_sync_gate_drops_stale_fronts() {
        let node = two_port_summer();
        node.set_method_sync("forward", true);

        // ts 1 vs ts 2: the older front (port 0) is dropped, no output.
        step(&node, &[Packet::from(1i64, 1), Packet::from(10i64, 2)]);
        assert!(!node.last_output().has_value());
        assert_eq!(node.port_depths(), vec![0, 1]);

        // Aligned at ts 2: fires.
        step(&node, &[Packet::from(2i64, 2), Packet::empty()]);
        assert_eq!(node.last_output().cast::<i64>().unwrap(), 12);
        assert_eq!(node.last_output().timestamp_ns(), 2);
    }

    #[test]
    fn test_non_producing_cycle_publishes_empty() {
        let node = two_port_summer();
        step(
            &node,
            &[Packet::from(1i64, 1), Packet::from(2i64, 1)],
        );
        assert!(node.last_output().has_value());

        // Next cycle has no inputs: output must clear, not re-forward.
        step(&node, &[Packet::empty(), Packet::empty()]);
        assert!(!node.last_output().has_value());
    }

    #[test]
    fn test_queue_bound_drops_oldest() {
        let node = two_port_summer();
        node.set_method_queue_size("forward", 2);

        for i in 0..5i64 {
            // Port 1 never fires, so port 0 backs up.
            step(&node, &[Packet::from(i, i as u64 + 1), Packet::empty()]);
        }
        assert_eq!(node.port_depths(), vec![2, 0]);
        let buffered = node.buffered(0);
        assert_eq!(buffered[0].cast::<i64>().unwrap(), 3);
        assert_eq!(buffered[1].cast::<i64>().unwrap(), 4);
    }

    #[test]
    fn test_panicking_method_is_contained() {
        struct Panicker;
        impl Component for Panicker {
            fn registry(&self) -> Arc<MethodRegistry> {
                static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
                REGISTRY
                    .get_or_init(|| {
                        Arc::new(
                            MethodRegistry::builder::<Panicker>()
                                .method1("forward", |_: &mut Panicker, _x: i64| -> i64 {
                                    panic!("boom")
                                })
                                .build(),
                        )
                    })
                    .clone()
            }
        }

        let node = NodeHandle::new(Panicker);
        let upstream = NodeHandle::new(Feeder);
        node.set_input(&upstream);

        let hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        step(&node, &[Packet::from(1i64, 1)]);
        std::panic::set_hook(hook);

        assert!(!node.last_output().has_value());
    }
}
