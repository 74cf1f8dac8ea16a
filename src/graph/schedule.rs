//! Schedule compilation.
//!
//! Compiles the task table and its precedence edges into topological
//! *levels* (Kahn's algorithm): every task in a level has all its
//! predecessors in earlier levels, so tasks within one level can run in
//! parallel. Tasks caught in a precedence cycle are never scheduled and
//! are reported once per compile.

use super::Task;
use crate::node::NodeHandle;

/// Statistics about a compiled schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleStats {
    /// Number of tasks in the graph.
    pub total_tasks: usize,

    /// Tasks actually placed into levels (excludes cycle members).
    pub scheduled_tasks: usize,

    /// Tasks with no predecessors.
    pub source_tasks: usize,

    /// Number of levels.
    pub levels: usize,

    /// Widest level (upper bound on per-cycle parallelism).
    pub max_width: usize,

    /// Compilation time in microseconds.
    pub compile_time_us: u64,
}

/// Topological level schedule over node handles.
pub struct Schedule {
    levels: Vec<Vec<NodeHandle>>,
    stats: ScheduleStats,
}

impl Schedule {
    pub(crate) fn compile(tasks: &[Task]) -> Schedule {
        let start_time = std::time::Instant::now();
        let n = tasks.len();

        let mut in_degree = vec![0u32; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (index, task) in tasks.iter().enumerate() {
            for pred in &task.predecessors {
                if pred.index() < n {
                    successors[pred.index()].push(index);
                    in_degree[index] += 1;
                }
            }
        }

        let mut levels: Vec<Vec<NodeHandle>> = Vec::new();
        let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let source_tasks = current.len();
        let mut scheduled = 0usize;

        while !current.is_empty() {
            let mut next = Vec::new();
            for &task in &current {
                for &succ in &successors[task] {
                    in_degree[succ] -= 1;
                    if in_degree[succ] == 0 {
                        next.push(succ);
                    }
                }
            }
            scheduled += current.len();
            levels.push(
                current
                    .iter()
                    .map(|&i| tasks[i].node.clone())
                    .collect(),
            );
            next.sort_unstable();
            current = next;
        }

        if scheduled != n {
            tracing::warn!(
                scheduled,
                total = n,
                "graph has a precedence cycle; unreachable tasks were not scheduled"
            );
        }

        let stats = ScheduleStats {
            total_tasks: n,
            scheduled_tasks: scheduled,
            source_tasks,
            levels: levels.len(),
            max_width: levels.iter().map(Vec::len).max().unwrap_or(0),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Schedule { levels, stats }
    }

    pub fn levels(&self) -> &[Vec<NodeHandle>] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn stats(&self) -> &ScheduleStats {
        &self.stats
    }
}
