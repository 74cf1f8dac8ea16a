//! Source components — zero-argument `forward`, driven once per cycle.

use crate::graph::FlowControl;
use crate::method::MethodRegistry;
use crate::node::Component;
use crate::packet::Packet;
use crate::types::register_tuple;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

/// Emits `start, start + step, …` up to and including `max`, then
/// signals stop.
pub struct NumberSource {
    current: i64,
    max: i64,
    step: i64,
    control: Option<FlowControl>,
}

impl NumberSource {
    pub fn new(start: i64, max: i64, step: i64) -> Self {
        Self {
            current: start,
            max,
            step,
            control: None,
        }
    }

    fn signal_stop(&self) {
        if let Some(control) = &self.control {
            control.stop();
        }
    }

    fn forward(&mut self) -> i64 {
        if self.current > self.max {
            self.signal_stop();
            return 0;
        }
        let value = self.current;
        if self.current >= self.max {
            self.signal_stop();
        }
        self.current += self.step;
        value
    }
}

impl Component for NumberSource {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<NumberSource>()
                        .method0("forward", NumberSource::forward)
                        .build(),
                )
            })
            .clone()
    }

    fn bind(&mut self, control: FlowControl) {
        self.control = Some(control);
    }
}

/// Replays a fixed sequence of pre-stamped packets, then signals stop.
/// Useful wherever tests need full control over timestamps.
pub struct StampedSource {
    frames: Vec<Packet>,
    cursor: usize,
    control: Option<FlowControl>,
}

impl StampedSource {
    pub fn new(frames: Vec<Packet>) -> Self {
        Self {
            frames,
            cursor: 0,
            control: None,
        }
    }

    /// Convenience: one packet per `(payload, timestamp_ns)` pair.
    pub fn of_values<T: Clone + Send + Sync + 'static>(values: &[(T, u64)]) -> Self {
        Self::new(
            values
                .iter()
                .map(|(v, ts)| Packet::from(v.clone(), *ts))
                .collect(),
        )
    }

    fn forward(&mut self) -> Packet {
        match self.frames.get(self.cursor) {
            Some(packet) => {
                self.cursor += 1;
                if self.cursor >= self.frames.len() {
                    if let Some(control) = &self.control {
                        control.stop();
                    }
                }
                packet.clone()
            }
            None => {
                if let Some(control) = &self.control {
                    control.stop();
                }
                Packet::empty()
            }
        }
    }
}

impl Component for StampedSource {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<StampedSource>()
                        .method0("forward", StampedSource::forward)
                        .build(),
                )
            })
            .clone()
    }

    fn bind(&mut self, control: FlowControl) {
        self.control = Some(control);
    }
}

/// Emits `(n, "value_n")` pairs up to and including `max`, then signals
/// stop. Registers its tuple type on construction so downstream
/// projections can subscribe to single fields.
pub struct PairEmitter {
    current: i64,
    max: i64,
    control: Option<FlowControl>,
}

impl PairEmitter {
    pub fn new(start: i64, max: i64) -> Self {
        register_tuple::<(i64, String)>();
        Self {
            current: start,
            max,
            control: None,
        }
    }

    fn forward(&mut self) -> (i64, String) {
        if self.current > self.max {
            if let Some(control) = &self.control {
                control.stop();
            }
            return (0, String::new());
        }
        let value = self.current;
        if self.current >= self.max {
            if let Some(control) = &self.control {
                control.stop();
            }
        }
        self.current += 1;
        (value, format!("value_{value}"))
    }
}

impl Component for PairEmitter {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<PairEmitter>()
                        .method0("forward", PairEmitter::forward)
                        .build(),
                )
            })
            .clone()
    }

    fn bind(&mut self, control: FlowControl) {
        self.control = Some(control);
    }
}

/// Payload whose instances are counted — lets tests assert that every
/// packet constructed through a graph is dropped again.
pub struct Tracked {
    pub value: i64,
}

static TRACKED_LIVE: AtomicI64 = AtomicI64::new(0);

impl Tracked {
    pub fn new(value: i64) -> Self {
        TRACKED_LIVE.fetch_add(1, Ordering::Relaxed);
        Self { value }
    }

    pub fn live_count() -> i64 {
        TRACKED_LIVE.load(Ordering::Relaxed)
    }

    pub fn reset_live_count() {
        TRACKED_LIVE.store(0, Ordering::Relaxed);
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        Self::new(self.value)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        TRACKED_LIVE.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Emits `max` [`Tracked`] payloads, then signals stop.
pub struct TrackedSource {
    current: i64,
    max: i64,
    control: Option<FlowControl>,
}

impl TrackedSource {
    pub fn new(max: i64) -> Self {
        Self {
            current: 0,
            max,
            control: None,
        }
    }

    fn forward(&mut self) -> Tracked {
        if self.current + 1 >= self.max {
            if let Some(control) = &self.control {
                control.stop();
            }
        }
        let value = self.current;
        self.current += 1;
        Tracked::new(value)
    }
}

impl Component for TrackedSource {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<TrackedSource>()
                        .method0("forward", TrackedSource::forward)
                        .build(),
                )
            })
            .clone()
    }

    fn bind(&mut self, control: FlowControl) {
        self.control = Some(control);
    }
}
