//! In-memory task registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{Task, TaskId, TaskRegistry};

/// Task registry backed by a `HashMap` behind a single read/write lock.
///
/// Lookups and listings share the read lock; inserts and deletes take the
/// write lock briefly.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<Task>>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Whether the registry holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

impl TaskRegistry for InMemoryRegistry {
    fn add(&self, task: Arc<Task>) {
        self.tasks.write().insert(task.id(), task);
    }

    fn find(&self, id: &TaskId) -> Option<Arc<Task>> {
        self.tasks.read().get(id).cloned()
    }

    fn find_all(&self) -> Vec<Arc<Task>> {
        self.tasks.read().values().cloned().collect()
    }

    fn delete(&self, id: &TaskId) {
        self.tasks.write().remove(id);
    }
}
