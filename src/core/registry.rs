//! Task registry abstraction.

use std::sync::Arc;

use super::task::{Task, TaskId};

/// Concurrency-safe keyed store of tasks.
///
/// Implementations must keep every single-key and whole-map operation
/// linearizable. They own no execution state; a task's own fields may change
/// while it is stored.
pub trait TaskRegistry: Send + Sync {
    /// Insert or overwrite the task under its id.
    fn add(&self, task: Arc<Task>);
    /// Point lookup. Absent is not an error.
    fn find(&self, id: &TaskId) -> Option<Arc<Task>>;
    /// Snapshot of all stored tasks, in no particular order.
    fn find_all(&self) -> Vec<Arc<Task>>;
    /// Remove the task if present.
    fn delete(&self, id: &TaskId);
}
