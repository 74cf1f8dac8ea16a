//! Runtime configuration for the executor.

use serde::{Deserialize, Serialize};

/// Executor tuning knobs.
///
/// The defaults are what most graphs want; embedders that know their
/// topology can cap the worker pool explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum number of worker threads used within one schedule level.
    /// `0` means "use the available parallelism of the host".
    pub worker_threads: usize,

    /// Log schedule statistics whenever the graph is recompiled.
    pub log_schedule: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            log_schedule: true,
        }
    }
}

impl ExecutorConfig {
    /// Resolve the effective worker count.
    pub fn resolved_workers(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
