//! Method ordering, multi-method dispatch, and the single output slot.

mod common;

use common::{build_and_connect, drain, run_to_completion};
use packetflow::components::{ChannelSink, MethodDispatchRecorder, MixedNode, StampedSource};
use packetflow::prelude::*;

#[test]
fn side_methods_run_before_forward_every_cycle() {
    const CYCLES: i64 = 4;
    let graph = ExecutionGraph::new();

    let left_src = create_node(
        "NumberSource",
        &ArgBag::new().arg(0i64).kwarg("max", CYCLES - 1),
    )
    .unwrap();
    let right_src = create_node(
        "NumberSource",
        &ArgBag::new().arg(100i64).kwarg("max", 100 + CYCLES - 1),
    )
    .unwrap();
    let forward_src = create_node(
        "NumberSource",
        &ArgBag::new().arg(200i64).kwarg("max", 200 + CYCLES - 1),
    )
    .unwrap();

    let recorder_component = MethodDispatchRecorder::new();
    let counters = recorder_component.counters();
    let recorder = NodeHandle::new(recorder_component);

    recorder.set_input_for("left", &left_src);
    recorder.set_input_for("right", &right_src);
    recorder.set_input(&forward_src);

    let nodes = [&left_src, &right_src, &forward_src, &recorder];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    assert_eq!(counters.left(), CYCLES as u64);
    assert_eq!(counters.right(), CYCLES as u64);
    assert_eq!(counters.forward(), CYCLES as u64);
    assert_eq!(counters.order_errors(), 0);
}

#[test]
fn exposed_methods_follow_registration_order() {
    let recorder = NodeHandle::new(MethodDispatchRecorder::new());
    let src = create_node("NumberSource", &ArgBag::new()).unwrap();

    recorder.set_input(&src);
    recorder.set_input_for("left", &src);
    recorder.set_input_for("right", &src);

    let methods = recorder.exposed_methods();
    assert_eq!(methods, vec!["forward", "left", "right"]);
}

#[test]
fn later_producing_method_overwrites_the_output_slot() {
    // `left` then `right` both produce in one cycle: the slot keeps
    // right's value.
    let graph = ExecutionGraph::new();

    let left_src = NodeHandle::new(StampedSource::of_values(&[(1i64, 1), (2i64, 2)]));
    let right_src = NodeHandle::new(StampedSource::of_values(&[(100i64, 1), (200i64, 2)]));

    let recorder = NodeHandle::new(MethodDispatchRecorder::new());
    recorder.set_input_for("left", &left_src);
    recorder.set_input_for("right", &right_src);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&recorder);

    let nodes = [&left_src, &right_src, &recorder, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    let outputs: Vec<i64> = drain(&rx);
    assert_eq!(outputs, vec![100, 200]);
}

#[test]
fn user_method_order_is_respected_with_forward_forced_last() {
    let graph = ExecutionGraph::new();

    let left_src = NodeHandle::new(StampedSource::of_values(&[(1i64, 1)]));
    let right_src = NodeHandle::new(StampedSource::of_values(&[(100i64, 1)]));

    let recorder = NodeHandle::new(MethodDispatchRecorder::new());
    recorder.set_input_for("left", &left_src);
    recorder.set_input_for("right", &right_src);
    // Reverse the side methods and sneak forward to the front; it is
    // still forced last, so `left` becomes the final producer.
    recorder.set_method_order(&["forward", "right", "left"]);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&recorder);

    let nodes = [&left_src, &right_src, &recorder, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    let outputs: Vec<i64> = drain(&rx);
    assert_eq!(outputs, vec![1]);
}

#[test]
fn void_only_cycles_emit_nothing_downstream() {
    // Only `set_string` (void) fires; the node's output stays empty and
    // the sink sees no packets — stale data is never re-forwarded.
    let graph = ExecutionGraph::new();

    let text_src = NodeHandle::new(StampedSource::of_values(&[
        ("abc".to_string(), 1),
        ("abcdef".to_string(), 2),
    ]));
    let mixed = NodeHandle::new(MixedNode::new());
    mixed.set_input_for("set_string", &text_src);

    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = NodeHandle::new(ChannelSink::new(tx));
    sink.set_input(&mixed);

    let nodes = [&text_src, &mixed, &sink];
    build_and_connect(&graph, &nodes);
    run_to_completion(&graph, &nodes);

    assert_eq!(rx.try_iter().count(), 0);
    // The configuration method did run: forward now adds the last length.
    let out = mixed.invoke("forward", &[Packet::from(0i64, 0)]).unwrap();
    assert_eq!(out.cast::<i64>().unwrap(), 6);
}

#[test]
fn one_shot_invoke_bypasses_wiring() {
    let mixed = NodeHandle::new(MixedNode::new());
    let ratio = mixed
        .invoke(
            "compute_ratio",
            &[Packet::from(3i64, 0), Packet::from(4i64, 0)],
        )
        .unwrap();
    assert_eq!(ratio.cast::<f64>().unwrap(), 0.75);

    let err = mixed.invoke("compute_ratio", &[Packet::from(3i64, 0)]);
    assert!(err.is_err());
}
