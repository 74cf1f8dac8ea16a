//! Sink components — consume packets, produce nothing.

use crate::method::MethodRegistry;
use crate::node::Component;
use crate::packet::Packet;
use crossbeam_channel::Sender;
use std::sync::{Arc, OnceLock};

/// Forwards every received packet into a channel, giving the embedder
/// (or a test) an ordered view of what reached the end of the graph.
pub struct ChannelSink {
    tx: Sender<Packet>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Packet>) -> Self {
        Self { tx }
    }

    fn forward(&mut self, packet: Packet) {
        if self.tx.send(packet).is_err() {
            tracing::debug!("channel sink receiver dropped, packet discarded");
        }
    }
}

impl Component for ChannelSink {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<ChannelSink>()
                        .method1("forward", ChannelSink::forward)
                        .build(),
                )
            })
            .clone()
    }
}

/// Accepts any packet and discards it.
pub struct NullSink;

impl NullSink {
    fn forward(&mut self, _packet: Packet) {}
}

impl Component for NullSink {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<NullSink>()
                        .method1("forward", NullSink::forward)
                        .build(),
                )
            })
            .clone()
    }
}
