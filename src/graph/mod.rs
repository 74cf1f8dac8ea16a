//! The execution graph: task table, precedence, and the stop flag.
//!
//! Nodes register tasks with [`NodeHandle::build`](crate::node::NodeHandle::build)
//! and record precedence with `connect`. The graph lazily compiles a
//! level schedule (cached by generation, recompiled when the topology
//! changes) that the executor drives once per cycle.

pub mod schedule;

use crate::node::NodeHandle;
use schedule::Schedule;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Index into the graph's task table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u32);

impl TaskId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// Handle a component uses to signal graph termination. The in-flight
/// cycle completes before the run loop exits.
#[derive(Clone)]
pub struct FlowControl {
    keep_running: Arc<AtomicBool>,
}

impl FlowControl {
    pub(crate) fn new(keep_running: Arc<AtomicBool>) -> Self {
        Self { keep_running }
    }

    pub fn stop(&self) {
        self.keep_running.store(false, Ordering::Relaxed);
    }
}

pub(crate) struct Task {
    pub node: NodeHandle,
    pub predecessors: Vec<TaskId>,
}

struct GraphInner {
    tasks: Vec<Task>,
    generation: u64,
    cached: Option<(u64, Arc<Schedule>)>,
}

/// Task topology plus the `keep_running` flag.
pub struct ExecutionGraph {
    inner: Mutex<GraphInner>,
    keep_running: Arc<AtomicBool>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GraphInner {
                tasks: Vec::new(),
                generation: 0,
                cached: None,
            }),
            keep_running: Arc::new(AtomicBool::new(true)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GraphInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn add_task(&self, node: NodeHandle) -> TaskId {
        let mut inner = self.lock();
        let id = TaskId(inner.tasks.len() as u32);
        inner.tasks.push(Task {
            node,
            predecessors: Vec::new(),
        });
        inner.generation += 1;
        id
    }

    pub(crate) fn add_precedence(&self, upstream: TaskId, downstream: TaskId) {
        let mut inner = self.lock();
        if upstream.index() >= inner.tasks.len() || downstream.index() >= inner.tasks.len() {
            tracing::warn!(?upstream, ?downstream, "precedence references unknown task");
            return;
        }
        inner.tasks[downstream.index()].predecessors.push(upstream);
        inner.generation += 1;
    }

    /// Clear the topology and re-arm `keep_running`. Registered nodes
    /// lose their task binding and must be rebuilt.
    pub fn reset(&self) {
        let mut inner = self.lock();
        for task in &inner.tasks {
            task.node.clear_task();
        }
        inner.tasks.clear();
        inner.cached = None;
        inner.generation += 1;
        self.keep_running.store(true, Ordering::Relaxed);
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::Relaxed)
    }

    pub(crate) fn arm(&self) {
        self.keep_running.store(true, Ordering::Relaxed);
    }

    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        self.keep_running.clone()
    }

    /// The level schedule for the current topology. Recompiled lazily;
    /// the flag reports whether this call recompiled.
    pub(crate) fn schedule(&self) -> (Arc<Schedule>, bool) {
        let mut inner = self.lock();
        if let Some((generation, schedule)) = &inner.cached {
            if *generation == inner.generation {
                return (schedule.clone(), false);
            }
        }
        let schedule = Arc::new(Schedule::compile(&inner.tasks));
        inner.cached = Some((inner.generation, schedule.clone()));
        (schedule, true)
    }

    /// Statistics of the current schedule, compiling it if needed.
    pub fn schedule_stats(&self) -> schedule::ScheduleStats {
        let (schedule, _) = self.schedule();
        schedule.stats().clone()
    }

    /// Serializable view of the wired topology, for diagnostics.
    pub fn topology(&self) -> TopologySnapshot {
        let inner = self.lock();
        let nodes = inner
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| NodeSnapshot {
                task: index as u32,
                label: task.node.label(),
                methods: task.node.exposed_methods(),
                upstreams: task.predecessors.iter().map(|t| t.0).collect(),
            })
            .collect();
        TopologySnapshot { nodes }
    }
}

impl Default for ExecutionGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// One task in a [`TopologySnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub task: u32,
    pub label: String,
    pub methods: Vec<String>,
    pub upstreams: Vec<u32>,
}

/// Snapshot of the task topology.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    pub nodes: Vec<NodeSnapshot>,
}
