//! Timestamp-gated dispatch and the N-input sync barrier.

mod common;

use common::{build_and_connect, drain_with_timestamps, run_to_completion};
use packetflow::components::{ChannelSink, StampedSource};
use packetflow::prelude::*;

#[test]
fn sync_gated_method_consumes_aligned_frontiers_only() {
    // A stamps 1,2,3; B stamps 2,3,4. The join fires at ts 2 and ts 3;
    // A's ts-1 packet is dropped, B's ts-4 packet is left unconsumed.
    let graph = ExecutionGraph::new();

    let numbers = NodeHandle::new(StampedSource::of_values(&[
        (1i64, 1),
        (2i64, 2),
        (3i64, 3),
    ]));
    let texts = NodeHandle::new(StampedSource::of_values(&[
        ("b".to_string(), 2),
        ("c".to_string(), 3),
        ("d".to_string(), 4),
    ]));

    let joiner = create_node("PairJoiner", &ArgBag::new()).unwrap();
    joiner.set_input(&numbers);
    joiner.set_input(&texts);
    joiner.set_method_sync("forward", true);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&joiner);

    let nodes = [&numbers, &texts, &joiner, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    let outputs: Vec<(String, u64)> = drain_with_timestamps(&rx);
    assert_eq!(
        outputs,
        vec![("b:2".to_string(), 2), ("c:3".to_string(), 3)]
    );
    // B's ts-4 packet is still buffered on its port at the boundary.
    assert_eq!(joiner.port_depths(), vec![0, 1]);
}

#[test]
fn sync_disabled_consumes_in_arrival_order() {
    let graph = ExecutionGraph::new();

    let numbers = NodeHandle::new(StampedSource::of_values(&[(1i64, 1), (2i64, 2)]));
    let texts = NodeHandle::new(StampedSource::of_values(&[
        ("x".to_string(), 50),
        ("y".to_string(), 60),
    ]));

    let joiner = create_node("PairJoiner", &ArgBag::new()).unwrap();
    joiner.set_input(&numbers);
    joiner.set_input(&texts);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&joiner);

    let nodes = [&numbers, &texts, &joiner, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    let outputs: Vec<(String, u64)> = drain_with_timestamps(&rx);
    assert_eq!(
        outputs,
        vec![("x:1".to_string(), 1), ("y:2".to_string(), 2)]
    );
}

#[test]
fn barrier_aligns_two_streams_within_tolerance() {
    let graph = ExecutionGraph::new();

    let fast = NodeHandle::new(StampedSource::of_values(&[
        (1i64, 100),
        (2i64, 200),
        (3i64, 300),
    ]));
    let slow = NodeHandle::new(StampedSource::of_values(&[
        (10i64, 105),
        (20i64, 205),
        (30i64, 305),
    ]));

    let barrier = SyncBarrier::new::<(i64, i64)>(10);
    barrier.set_input(&fast);
    barrier.set_input(&slow);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&barrier);

    let nodes = [&fast, &slow, &barrier, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    let outputs: Vec<((i64, i64), u64)> = drain_with_timestamps(&rx);
    assert_eq!(
        outputs,
        vec![((1, 10), 105), ((2, 20), 205), ((3, 30), 305)]
    );
}

#[test]
fn barrier_drops_unmatched_old_packets() {
    let graph = ExecutionGraph::new();

    // The first packet of `early` is far older than anything on `late`.
    let early = NodeHandle::new(StampedSource::of_values(&[(0i64, 1), (1i64, 500)]));
    let late = NodeHandle::new(StampedSource::of_values(&[(10i64, 500), (11i64, 900)]));

    let barrier = SyncBarrier::new::<(i64, i64)>(0);
    barrier.set_input(&early);
    barrier.set_input(&late);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&barrier);

    let nodes = [&early, &late, &barrier, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    let outputs: Vec<((i64, i64), u64)> = drain_with_timestamps(&rx);
    assert_eq!(outputs, vec![((1, 10), 500)]);
}
