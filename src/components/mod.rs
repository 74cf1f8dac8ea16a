//! Reference component library.
//!
//! These components exercise every dispatcher feature (sources, typed
//! transforms, multi-port joins, void configuration methods, tracked
//! payloads, sinks) and are seeded into the global node registry so
//! graphs can be assembled by name. [`ChannelSink`] is the exception —
//! it needs a live channel and is constructed directly.

pub mod sinks;
pub mod sources;
pub mod transforms;

pub use sinks::{ChannelSink, NullSink};
pub use sources::{NumberSource, PairEmitter, StampedSource, Tracked, TrackedSource};
pub use transforms::{
    DispatchCounters, IntToText, MethodDispatchRecorder, MixedNode, MultiplyBy, PairJoiner,
    PrefixText, TrackedToNumber,
};

use crate::registry::{Arg, NodeRegistry};

/// Seed `registry` with the reference components.
pub fn register_defaults(registry: &NodeRegistry) {
    registry.register(
        "NumberSource",
        vec![
            Arg::new("start", 0i64),
            Arg::new("max", 10i64),
            Arg::new("step", 1i64),
        ],
        |args| {
            Ok(Box::new(NumberSource::new(
                args.get("start")?,
                args.get("max")?,
                args.get("step")?,
            )))
        },
    );

    registry.register(
        "MultiplyBy",
        vec![Arg::new("factor", 2i64)],
        |args| Ok(Box::new(MultiplyBy::new(args.get("factor")?))),
    );

    registry.register("IntToText", Vec::new(), |_| Ok(Box::new(IntToText)));

    registry.register(
        "PrefixText",
        vec![Arg::new("prefix", "[Prefix] ".to_string())],
        |args| Ok(Box::new(PrefixText::new(args.get::<String>("prefix")?))),
    );

    registry.register(
        "PairEmitter",
        vec![Arg::new("start", 0i64), Arg::new("max", 5i64)],
        |args| {
            Ok(Box::new(PairEmitter::new(
                args.get("start")?,
                args.get("max")?,
            )))
        },
    );

    registry.register("PairJoiner", Vec::new(), |_| Ok(Box::new(PairJoiner)));

    registry.register("MixedNode", Vec::new(), |_| Ok(Box::new(MixedNode::new())));

    registry.register("MethodDispatchRecorder", Vec::new(), |_| {
        Ok(Box::new(MethodDispatchRecorder::new()))
    });

    registry.register(
        "TrackedSource",
        vec![Arg::new("max", 3i64)],
        |args| Ok(Box::new(TrackedSource::new(args.get("max")?))),
    );

    registry.register("TrackedToNumber", Vec::new(), |_| {
        Ok(Box::new(TrackedToNumber))
    });

    registry.register("NullSink", Vec::new(), |_| Ok(Box::new(NullSink)));
}
