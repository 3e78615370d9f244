//! Scheduler and service configuration structures.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::AppResult;

/// Default bound of the pending queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default listen address of the HTTP service.
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8888";
/// Default stack size for worker threads.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

/// Scheduler sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of pending tasks before admission is refused.
    pub queue_capacity: usize,
    /// Number of worker threads draining the queue. Zero means nothing runs.
    pub worker_count: usize,
    /// Threads of the shared runtime that drives outbound I/O.
    #[serde(default = "default_parallelism")]
    pub io_threads: usize,
    /// Stack size of each worker thread in bytes.
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,
}

fn default_parallelism() -> usize {
    num_cpus::get()
}

const fn default_thread_stack_size() -> usize {
    DEFAULT_THREAD_STACK_SIZE
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: default_parallelism(),
            io_threads: default_parallelism(),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl SchedulerConfig {
    /// Configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pending queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the number of workers.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the number of I/O runtime threads.
    #[must_use]
    pub const fn with_io_threads(mut self, io_threads: usize) -> Self {
        self.io_threads = io_threads;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.io_threads == 0 {
            return Err("io_threads must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Full service configuration read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP API listens on.
    pub server_address: String,
    /// Scheduler sizing.
    pub scheduler: SchedulerConfig,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    ///
    /// Recognised variables: `SERVER_ADDRESS`, `MAX_TASKS_IN_QUEUE`, `WORKERS_COUNT`,
    /// `IO_THREADS`. A `.env` file is not read here; the binary loads it at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved configuration is invalid.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// Missing or unparsable integers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved configuration is invalid.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_address =
            lookup("SERVER_ADDRESS").unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_owned());
        let scheduler = SchedulerConfig {
            queue_capacity: lookup_usize(&lookup, "MAX_TASKS_IN_QUEUE", DEFAULT_QUEUE_CAPACITY),
            worker_count: lookup_usize(&lookup, "WORKERS_COUNT", default_parallelism()),
            io_threads: lookup_usize(&lookup, "IO_THREADS", default_parallelism()),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        };
        scheduler.validate().map_err(anyhow::Error::msg)?;

        Ok(Self {
            server_address,
            scheduler,
        })
    }
}

fn lookup_usize<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!(key, value = %raw, error = %e, default, "Invalid integer, using default");
        default
    })
}
