//! The N-input timestamp aligner.
//!
//! A `SyncBarrier` exposes one `forward` whose output is the tuple of
//! its input types. Per cycle it buffers inputs, then repeatedly either
//! publishes the aligned frontier (all fronts within the tolerance
//! window, stamped with the newest timestamp) or drops the oldest
//! fronts to re-align.

use crate::error::FlowError;
use crate::method::{InvokerFn, MethodRegistry, MethodSignature};
use crate::node::{Component, NodeHandle, NodeKind};
use crate::packet::Packet;
use crate::types::{register_tuple, tuple::entry_for, TupleValue, Value};
use std::sync::Arc;

/// Builder for timestamp-aligning barrier nodes.
pub struct SyncBarrier;

impl SyncBarrier {
    /// A barrier aligning the element types of `T`; wire one upstream
    /// per element, in order. `tolerance_ns` is the widest allowed
    /// timestamp spread within one published tuple.
    pub fn new<T: TupleValue>(tolerance_ns: u64) -> NodeHandle {
        register_tuple::<T>();
        let entry = entry_for::<T>();

        let signature = MethodSignature {
            inputs: entry.elements.clone(),
            output: entry.tuple,
        };
        let compose = entry.compose.clone();
        let arity = entry.size();
        let tuple_name = entry.tuple.name();
        let invoker: Arc<InvokerFn> = Arc::new(move |_target, inputs| {
            if inputs.len() != arity {
                return Err(FlowError::Arity {
                    method: "forward".to_string(),
                    expected: arity,
                    got: inputs.len(),
                });
            }
            let values: Vec<Value> = inputs.iter().map(|p| p.value().clone()).collect();
            let max_ts = inputs.iter().map(Packet::timestamp_ns).max().unwrap_or(0);
            compose(&values)
                .map(|tuple| Packet::from_value(tuple, max_ts))
                .ok_or_else(|| FlowError::TypeMismatch {
                    expected: tuple_name.to_string(),
                    actual: "mismatched barrier inputs".to_string(),
                })
        });
        let registry = Arc::new(MethodRegistry::single_raw("forward", signature, invoker));

        struct BarrierComponent {
            registry: Arc<MethodRegistry>,
        }

        impl Component for BarrierComponent {
            fn registry(&self) -> Arc<MethodRegistry> {
                self.registry.clone()
            }
        }

        let registry_for_node = registry.clone();
        NodeHandle::assemble(
            Box::new(BarrierComponent { registry }),
            registry_for_node,
            format!("SyncBarrier<{}>", tuple_name),
            NodeKind::Aligned {
                tolerance_ns,
                entry,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::ID_FORWARD;
    use crate::node::NodeHandle;
    use crate::types::TypeDescriptor;
    use std::sync::OnceLock;

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

    fn barrier_with_ports(tolerance_ns: u64) -> NodeHandle {
        let barrier = SyncBarrier::new::<(i64, String)>(tolerance_ns);
        let a = NodeHandle::new(Feeder);
        let b = NodeHandle::new(Feeder);
        barrier.set_input(&a);
        barrier.set_input(&b);
        barrier
    }

    #[test]
    fn test_exposes_tuple_signature() {
        let barrier = SyncBarrier::new::<(i64, String)>(0);
        let info = barrier.type_info();
        let signature = info.methods.get(&ID_FORWARD).unwrap();
        assert_eq!(signature.inputs.len(), 2);
        assert_eq!(signature.output, TypeDescriptor::of::<(i64, String)>());
    }

    #[test]
    fn test_aligned_frontier_publishes_tuple() {
        let barrier = barrier_with_ports(0);
        barrier.state().step(&[
            Packet::from(5i64, 10),
            Packet::from("five".to_string(), 10),
        ]);
        let out = barrier.last_output();
        assert_eq!(
            out.cast::<(i64, String)>().unwrap(),
            (5, "five".to_string())
        );
        assert_eq!(out.timestamp_ns(), 10);
    }

    #[test]
    fn test_misaligned_frontier_drops_oldest() {
        let barrier = barrier_with_ports(0);
        barrier.state().step(&[
            Packet::from(1i64, 1),
            Packet::from("late".to_string(), 5),
        ]);
        // ts 1 dropped; nothing published yet.
        assert!(!barrier.last_output().has_value());
        assert_eq!(barrier.port_depths(), vec![0, 1]);

        barrier
            .state()
            .step(&[Packet::from(2i64, 5), Packet::empty()]);
        let out = barrier.last_output();
        assert_eq!(out.cast::<(i64, String)>().unwrap(), (2, "late".to_string()));
        assert_eq!(out.timestamp_ns(), 5);
    }

    #[test]
    fn test_tolerance_window_allows_spread() {
        let barrier = barrier_with_ports(10);
        barrier.state().step(&[
            Packet::from(7i64, 100),
            Packet::from("near".to_string(), 108),
        ]);
        let out = barrier.last_output();
        assert!(out.has_value());
        assert_eq!(out.timestamp_ns(), 108);
    }

    #[test]
    fn test_one_shot_invoke_composes() {
        let barrier = SyncBarrier::new::<(i64, String)>(0);
        let out = barrier
            .invoke(
                "forward",
                &[
                    Packet::from(9i64, 3),
                    Packet::from("nine".to_string(), 4),
                ],
            )
            .unwrap();
        assert_eq!(out.cast::<(i64, String)>().unwrap(), (9, "nine".to_string()));
        assert_eq!(out.timestamp_ns(), 4);
    }
}
