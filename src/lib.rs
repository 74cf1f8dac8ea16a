//! # packetflow: a cycle-driven dataflow runtime
//!
//! Components expose *typed methods*; nodes connect those methods with
//! named output-to-input edges; a scheduler moves timestamped, typed
//! packets between them, one whole-graph cycle at a time.
//!
//! ## Architecture
//!
//! - **Types**: every payload carries a [`TypeDescriptor`]; conversions
//!   go through the process-wide converter registry, consulted only by
//!   method invokers.
//! - **Methods**: each component class builds a [`MethodRegistry`] once
//!   — signatures plus type-erased invokers, keyed by FNV-1a method ids.
//! - **Nodes**: per-port FIFO buffers, per-method sync/queue config, a
//!   deterministic "configure first, compute last" dispatch order, and
//!   a single output slot downstream nodes read.
//! - **Graph & executor**: nodes register tasks and precedence; the
//!   executor compiles a topological level schedule and drives it in
//!   parallel until a source signals stop.
//!
//! ## Example
//!
//! ```
//! use packetflow::prelude::*;
//!
//! let graph = ExecutionGraph::new();
//!
//! let source = create_node("NumberSource", &ArgBag::new().arg(0i64).kwarg("max", 3i64))?;
//! let double = create_node("MultiplyBy", &ArgBag::new().arg(2i64))?;
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let sink = NodeHandle::new(ChannelSink::new(tx));
//!
//! double.set_input(&source);
//! sink.set_input(&double);
//!
//! for node in [&source, &double, &sink] {
//!     node.build(&graph);
//! }
//! for node in [&source, &double, &sink] {
//!     node.connect(&graph)?;
//! }
//!
//! let executor = Executor::new();
//! executor.open(&[source.clone(), double.clone(), sink.clone()])?;
//! executor.run(&graph);
//! executor.close(&[source, double, sink])?;
//!
//! let doubled: Vec<i64> = rx.try_iter().map(|p| p.cast::<i64>().unwrap()).collect();
//! assert_eq!(doubled, vec![0, 2, 4, 6]);
//! # Ok::<(), packetflow::FlowError>(())
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod method;
pub mod node;
pub mod packet;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use config::ExecutorConfig;
pub use error::{FlowError, Result, ResultExt};
pub use executor::Executor;
pub use graph::schedule::ScheduleStats;
pub use graph::{ExecutionGraph, FlowControl, TopologySnapshot};
pub use method::{MethodId, MethodRegistry, MethodSignature, ID_CLOSE, ID_FORWARD, ID_OPEN};
pub use node::{
    barrier::SyncBarrier, projection_node, Component, MethodConfig, NodeHandle, NodeTypeInfo,
};
pub use packet::{now_ns, Packet};
pub use registry::{create_node, Arg, ArgBag, NodeRegistry};
pub use types::{converters, register_tuple, tuple_size, TupleValue, TypeDescriptor, Value};

/// One-line import for graph assembly.
pub mod prelude {
    pub use crate::components::{ChannelSink, NullSink};
    pub use crate::config::ExecutorConfig;
    pub use crate::error::{FlowError, Result, ResultExt};
    pub use crate::executor::Executor;
    pub use crate::graph::ExecutionGraph;
    pub use crate::node::{barrier::SyncBarrier, projection_node, Component, NodeHandle};
    pub use crate::packet::Packet;
    pub use crate::registry::{create_node, ArgBag};
    pub use crate::types::TypeDescriptor;
}
