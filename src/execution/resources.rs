//! Resource limits for build containers.

use serde::{Deserialize, Serialize};

/// Resource limits applied to a build container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Memory limit in megabytes.
    pub memory_mb: u64,
    /// CPU cores available (e.g., 0.5, 1.0, 2.0).
    pub cpu_cores: f64,
    /// Maximum number of processes allowed.
    pub max_processes: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        // Maven and the Go toolchain both want a couple of GB to be comfortable
        Self {
            memory_mb: 2048,
            cpu_cores: 2.0,
            max_processes: 1024,
        }
    }
}

impl ExecutionLimits {
    /// Creates new execution limits with the given parameters.
    pub fn new(memory_mb: u64, cpu_cores: f64, max_processes: u64) -> Self {
        Self {
            memory_mb,
            cpu_cores,
            max_processes,
        }
    }

    /// Returns memory limit in bytes.
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb * 1024 * 1024) as i64
    }

    /// Returns CPU period in microseconds (fixed at 100ms).
    pub fn cpu_period(&self) -> i64 {
        100_000
    }

    /// Returns CPU quota based on cores allocated.
    ///
    /// Formula: quota = period * cores
    /// e.g., 1.0 core = 100000 quota (100% of one CPU)
    pub fn cpu_quota(&self) -> i64 {
        (self.cpu_period() as f64 * self.cpu_cores) as i64
    }
}
