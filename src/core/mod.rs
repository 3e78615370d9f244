//! Scheduler core: tasks, the registry seam, the HTTP capability and the worker pool.

pub mod client;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use client::{FetchRequest, FetchResponse, HttpClient, ResponseBody};
pub use error::{AppResult, FetchError, SchedulerError};
pub use registry::TaskRegistry;
pub use scheduler::{Scheduler, SchedulerStats};
pub use task::{FetchOutcome, Task, TaskId, TaskState, TaskStatus};
