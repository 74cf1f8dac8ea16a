//! The graph executor — cycle loop and lifecycle fan-out.
//!
//! One cycle is one whole-graph pass: every level of the compiled
//! schedule runs in order, and nodes within a level run concurrently on
//! scoped worker threads. `run` blocks the caller until `keep_running`
//! is cleared (by a source's [`FlowControl`](crate::graph::FlowControl)
//! or [`NodeHandle::stop`](crate::node::NodeHandle::stop)); the
//! in-flight cycle always completes.

use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::graph::ExecutionGraph;
use crate::node::{dispatch, NodeHandle};

/// Drives an [`ExecutionGraph`] and fans lifecycle calls out to nodes.
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Call `Open` on every node; fails fast on the first lifecycle error.
    pub fn open(&self, nodes: &[NodeHandle]) -> Result<()> {
        for node in nodes {
            node.open(&[])?;
        }
        Ok(())
    }

    /// Call `Close` on every node; fails fast on the first lifecycle error.
    pub fn close(&self, nodes: &[NodeHandle]) -> Result<()> {
        for node in nodes {
            node.close(&[])?;
        }
        Ok(())
    }

    /// Run whole-graph cycles until `keep_running` is cleared.
    pub fn run(&self, graph: &ExecutionGraph) {
        graph.arm();
        tracing::info!(tasks = graph.task_count(), "executor run started");

        let mut cycles = 0u64;
        while graph.keep_running() {
            let (schedule, recompiled) = graph.schedule();
            if recompiled && self.config.log_schedule {
                let stats = schedule.stats();
                tracing::info!(
                    total = stats.total_tasks,
                    scheduled = stats.scheduled_tasks,
                    sources = stats.source_tasks,
                    levels = stats.levels,
                    max_width = stats.max_width,
                    compile_us = stats.compile_time_us,
                    "schedule recompiled"
                );
            }
            if schedule.is_empty() {
                tracing::warn!("run on an empty graph; nothing to drive");
                break;
            }
            for level in schedule.levels() {
                self.run_level(level);
            }
            cycles += 1;
        }

        tracing::info!(cycles, "executor run finished");
    }

    fn run_level(&self, level: &[NodeHandle]) {
        if level.len() <= 1 {
            for node in level {
                dispatch::run_cycle(node);
            }
            return;
        }
        let workers = self.config.resolved_workers().max(1);
        let chunk_size = level.len().div_ceil(workers);
        std::thread::scope(|scope| {
            for nodes in level.chunks(chunk_size) {
                scope.spawn(move || {
                    for node in nodes {
                        dispatch::run_cycle(node);
                    }
                });
            }
        });
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
