//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use packetflow::prelude::*;

/// Build every node into the graph, then wire precedence.
pub fn build_and_connect(graph: &ExecutionGraph, nodes: &[&NodeHandle]) {
    for node in nodes {
        node.build(graph);
    }
    for node in nodes {
        node.connect(graph).expect("wiring failed");
    }
}

/// Open all nodes, run the graph to completion, close all nodes.
pub fn run_to_completion(graph: &ExecutionGraph, nodes: &[&NodeHandle]) {
    let executor = Executor::new();
    let owned: Vec<NodeHandle> = nodes.iter().map(|n| (*n).clone()).collect();
    executor.open(&owned).expect("open failed");
    executor.run(graph);
    executor.close(&owned).expect("close failed");
}

/// Drain a sink channel into typed payloads.
pub fn drain<T: Clone + 'static>(rx: &crossbeam_channel::Receiver<Packet>) -> Vec<T> {
    rx.try_iter()
        .map(|p| p.cast::<T>().expect("unexpected payload type"))
        .collect()
}

/// Drain a sink channel into (payload, timestamp) pairs.
pub fn drain_with_timestamps<T: Clone + 'static>(
    rx: &crossbeam_channel::Receiver<Packet>,
) -> Vec<(T, u64)> {
    rx.try_iter()
        .map(|p| {
            (
                p.cast::<T>().expect("unexpected payload type"),
                p.timestamp_ns(),
            )
        })
        .collect()
}
