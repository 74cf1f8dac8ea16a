//! Transform components — typed methods over buffered inputs.

use crate::components::sources::Tracked;
use crate::method::MethodRegistry;
use crate::node::Component;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Multiplies integer input by a constant factor.
pub struct MultiplyBy {
    factor: i64,
}

impl MultiplyBy {
    pub fn new(factor: i64) -> Self {
        Self { factor }
    }

    fn forward(&mut self, input: i64) -> i64 {
        input * self.factor
    }
}

impl Component for MultiplyBy {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<MultiplyBy>()
                        .method1("forward", MultiplyBy::forward)
                        .build(),
                )
            })
            .clone()
    }
}

/// Formats integer input as text.
pub struct IntToText;

impl IntToText {
    fn forward(&mut self, input: i64) -> String {
        input.to_string()
    }
}

impl Component for IntToText {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<IntToText>()
                        .method1("forward", IntToText::forward)
                        .build(),
                )
            })
            .clone()
    }
}

/// Prepends a fixed prefix to string input.
pub struct PrefixText {
    prefix: String,
}

impl PrefixText {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn forward(&mut self, input: String) -> String {
        format!("{}{}", self.prefix, input)
    }
}

impl Component for PrefixText {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<PrefixText>()
                        .method1("forward", PrefixText::forward)
                        .build(),
                )
            })
            .clone()
    }
}

/// Joins an integer and a string into `text:number`.
pub struct PairJoiner;

impl PairJoiner {
    fn forward(&mut self, number: i64, text: String) -> String {
        format!("{text}:{number}")
    }
}

impl Component for PairJoiner {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<PairJoiner>()
                        .method2("forward", PairJoiner::forward)
                        .build(),
                )
            })
            .clone()
    }
}

/// Heterogeneous fixture: data path, void configuration method, and a
/// two-argument computation.
pub struct MixedNode {
    length: i64,
}

impl MixedNode {
    pub fn new() -> Self {
        Self { length: 0 }
    }

    fn forward(&mut self, input: i64) -> i64 {
        input + self.length
    }

    fn set_string(&mut self, value: String) {
        self.length = value.len() as i64;
    }

    fn compute_ratio(&mut self, a: i64, b: i64) -> f64 {
        if b == 0 {
            return 0.0;
        }
        a as f64 / b as f64
    }
}

impl Default for MixedNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for MixedNode {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<MixedNode>()
                        .method1("forward", MixedNode::forward)
                        .method1("set_string", MixedNode::set_string)
                        .method2("compute_ratio", MixedNode::compute_ratio)
                        .build(),
                )
            })
            .clone()
    }
}

/// Shared counters observed by dispatch-order tests.
#[derive(Default)]
pub struct DispatchCounters {
    left: AtomicU64,
    right: AtomicU64,
    forward: AtomicU64,
    order_errors: AtomicU64,
}

impl DispatchCounters {
    pub fn left(&self) -> u64 {
        self.left.load(Ordering::Relaxed)
    }

    pub fn right(&self) -> u64 {
        self.right.load(Ordering::Relaxed)
    }

    pub fn forward(&self) -> u64 {
        self.forward.load(Ordering::Relaxed)
    }

    pub fn order_errors(&self) -> u64 {
        self.order_errors.load(Ordering::Relaxed)
    }
}

/// Records the per-cycle ordering of `left`, `right`, and `forward`
/// invocations. `forward` counts an order error whenever it runs before
/// both side methods have fired in the same cycle.
pub struct MethodDispatchRecorder {
    counters: Arc<DispatchCounters>,
    left_ready: bool,
    right_ready: bool,
}

impl MethodDispatchRecorder {
    pub fn new() -> Self {
        Self::with_counters(Arc::new(DispatchCounters::default()))
    }

    pub fn with_counters(counters: Arc<DispatchCounters>) -> Self {
        Self {
            counters,
            left_ready: false,
            right_ready: false,
        }
    }

    pub fn counters(&self) -> Arc<DispatchCounters> {
        self.counters.clone()
    }

    fn forward(&mut self, input: i64) -> i64 {
        if !self.left_ready || !self.right_ready {
            self.counters.order_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.left_ready = false;
        self.right_ready = false;
        self.counters.forward.fetch_add(1, Ordering::Relaxed);
        input
    }

    fn left(&mut self, input: i64) -> i64 {
        self.left_ready = true;
        self.counters.left.fetch_add(1, Ordering::Relaxed);
        input
    }

    fn right(&mut self, input: i64) -> i64 {
        self.right_ready = true;
        self.counters.right.fetch_add(1, Ordering::Relaxed);
        input
    }
}

impl Default for MethodDispatchRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for MethodDispatchRecorder {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<MethodDispatchRecorder>()
                        .method1("forward", MethodDispatchRecorder::forward)
                        .method1("left", MethodDispatchRecorder::left)
                        .method1("right", MethodDispatchRecorder::right)
                        .build(),
                )
            })
            .clone()
    }
}

/// Unwraps a [`Tracked`] payload into its plain number.
pub struct TrackedToNumber;

impl TrackedToNumber {
    fn forward(&mut self, input: Tracked) -> i64 {
        input.value
    }
}

impl Component for TrackedToNumber {
    fn registry(&self) -> Arc<MethodRegistry> {
        static REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();
        REGISTRY
            .get_or_init(|| {
                Arc::new(
                    MethodRegistry::builder::<TrackedToNumber>()
                        .method1("forward", TrackedToNumber::forward)
                        .build(),
                )
            })
            .clone()
    }
}
