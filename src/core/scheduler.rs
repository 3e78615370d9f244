//! Bounded-queue scheduler with a fixed pool of worker threads.
//!
//! Admission is a non-blocking `try_send` into a bounded `crossbeam-channel`:
//! a full queue fails fast with [`SchedulerError::ServiceOverloaded`] instead of
//! making the caller wait. Each worker is a dedicated OS thread that blocks on
//! the channel, claims one task at a time and drives its fetch to completion on
//! a shared tokio runtime.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fetch_scheduler::core::Scheduler;
//! use fetch_scheduler::infra::{InMemoryRegistry, ReqwestClient};
//!
//! let scheduler = Scheduler::new(
//!     100,
//!     4,
//!     Arc::new(InMemoryRegistry::new()),
//!     Arc::new(ReqwestClient::new()),
//! )?;
//!
//! let task = scheduler.schedule("https://example.com", "GET", Default::default())?;
//! let same = scheduler.find_by_id(&task.id())?;
//! scheduler.close();
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;

use super::client::HttpClient;
use super::error::SchedulerError;
use super::registry::TaskRegistry;
use super::task::{Task, TaskId, TaskStatus};

/// Snapshot of scheduler utilisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Capacity of the pending queue.
    pub queue_capacity: usize,
    /// Tasks waiting in the queue.
    pub queued_tasks: usize,
    /// Tasks currently being executed.
    pub active_tasks: u64,
    /// Tasks admitted since construction.
    pub submitted_tasks: u64,
    /// Schedule calls refused because the queue was full.
    pub rejected_tasks: u64,
    /// Tasks that reached `FINISHED`.
    pub finished_tasks: u64,
    /// Tasks that reached `FAILED`.
    pub failed_tasks: u64,
}

#[derive(Debug, Default)]
struct SchedulerCounters {
    active_tasks: AtomicU64,
    submitted_tasks: AtomicU64,
    rejected_tasks: AtomicU64,
    finished_tasks: AtomicU64,
    failed_tasks: AtomicU64,
}

impl SchedulerCounters {
    fn record_outcome(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Finished => &self.finished_tasks,
            TaskStatus::Failed => &self.failed_tasks,
            TaskStatus::Ready | TaskStatus::InProgress => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Scheduler owning the pending queue, the worker pool and a task registry.
pub struct Scheduler {
    queue_capacity: usize,
    worker_count: usize,
    /// `None` once closed.
    task_tx: Mutex<Option<Sender<Arc<Task>>>>,
    /// Keeps the channel connected when there are no workers.
    task_rx: Receiver<Arc<Task>>,
    registry: Arc<dyn TaskRegistry>,
    counters: Arc<SchedulerCounters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Shared with every worker; the last holder shuts it down.
    io_runtime: Option<Arc<Runtime>>,
}

impl Scheduler {
    /// Create a scheduler with `queue_capacity` pending slots and `worker_count` workers.
    ///
    /// Capacity 0 is accepted and rejects every `schedule` call; zero workers
    /// leave admitted tasks `READY` forever.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::WorkerSpawn` if a thread or the I/O runtime
    /// cannot be created.
    pub fn new(
        queue_capacity: usize,
        worker_count: usize,
        registry: Arc<dyn TaskRegistry>,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, SchedulerError> {
        let config = SchedulerConfig::new()
            .with_queue_capacity(queue_capacity)
            .with_worker_count(worker_count)
            .with_io_threads(worker_count.clamp(1, num_cpus::get()));
        Self::start(&config, registry, client)
    }

    /// Create a scheduler from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid,
    /// or `SchedulerError::WorkerSpawn` if a worker cannot be started.
    pub fn with_config(
        config: &SchedulerConfig,
        registry: Arc<dyn TaskRegistry>,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Self::start(config, registry, client)
    }

    fn start(
        config: &SchedulerConfig,
        registry: Arc<dyn TaskRegistry>,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, SchedulerError> {
        let io_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.io_threads.max(1))
            .thread_name("fetch-io")
            .enable_all()
            .build()
            .map(Arc::new)
            .map_err(|e| SchedulerError::WorkerSpawn(format!("io runtime: {e}")))?;

        let (task_tx, task_rx) = bounded::<Arc<Task>>(config.queue_capacity);
        let counters = Arc::new(SchedulerCounters::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let spawned = spawn_worker(
                worker_id,
                task_rx.clone(),
                Arc::clone(&client),
                Arc::clone(&counters),
                Arc::clone(&io_runtime),
                config.thread_stack_size,
            );
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Disconnect the queue so already started workers exit.
                    drop(task_tx);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    release_runtime(io_runtime);
                    return Err(SchedulerError::WorkerSpawn(format!(
                        "worker {worker_id}: {e}"
                    )));
                }
            }
        }

        info!(
            queue_capacity = config.queue_capacity,
            worker_count = config.worker_count,
            io_threads = config.io_threads,
            "Scheduler started"
        );

        Ok(Self {
            queue_capacity: config.queue_capacity,
            worker_count: config.worker_count,
            task_tx: Mutex::new(Some(task_tx)),
            task_rx,
            registry,
            counters,
            workers: Mutex::new(workers),
            io_runtime: Some(io_runtime),
        })
    }

    /// Create a task and admit it into the pending queue.
    ///
    /// Admission never blocks. An admitted task is also recorded in the registry;
    /// a rejected one is discarded and never becomes visible.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidUrl` if the URL does not parse
    /// - `SchedulerError::ServiceOverloaded` if the queue has no free slot
    /// - `SchedulerError::Shutdown` if the scheduler has been closed
    pub fn schedule(
        &self,
        url: &str,
        method: &str,
        headers: HashMap<String, String>,
    ) -> Result<Arc<Task>, SchedulerError> {
        let task = Arc::new(Task::new(method, url, headers)?);

        if self.queue_capacity == 0 {
            return Err(self.reject(&task));
        }

        let task_tx = self.task_tx.lock();
        let Some(task_tx) = task_tx.as_ref() else {
            return Err(SchedulerError::Shutdown);
        };

        match task_tx.try_send(Arc::clone(&task)) {
            Ok(()) => {
                self.registry.add(Arc::clone(&task));
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(task_id = %task.id(), url = %task.url(), "Task admitted");
                Ok(task)
            }
            Err(TrySendError::Full(_)) => Err(self.reject(&task)),
            Err(TrySendError::Disconnected(_)) => Err(SchedulerError::Shutdown),
        }
    }

    fn reject(&self, task: &Task) -> SchedulerError {
        self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
        warn!(
            url = %task.url(),
            queue_capacity = self.queue_capacity,
            "Task queue is full, rejecting"
        );
        SchedulerError::ServiceOverloaded
    }

    /// All tasks known to the registry, in every status.
    #[must_use]
    pub fn find_all(&self) -> Vec<Arc<Task>> {
        self.registry.find_all()
    }

    /// Look up a task by id.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::TaskNotFound` if no such task is stored.
    pub fn find_by_id(&self, id: &TaskId) -> Result<Arc<Task>, SchedulerError> {
        self.registry.find(id).ok_or(SchedulerError::TaskNotFound)
    }

    /// Cancel the task's in-flight fetch (best effort) and remove it from the registry.
    ///
    /// Unknown ids are ignored.
    pub fn delete(&self, id: &TaskId) {
        if let Some(task) = self.registry.find(id) {
            task.cancel();
            self.registry.delete(id);
            debug!(task_id = %id, status = %task.status(), "Task deleted");
        }
    }

    /// Current utilisation counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            worker_count: self.worker_count,
            queue_capacity: self.queue_capacity,
            queued_tasks: self.task_rx.len(),
            active_tasks: self.counters.active_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.counters.submitted_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.counters.rejected_tasks.load(Ordering::Relaxed),
            finished_tasks: self.counters.finished_tasks.load(Ordering::Relaxed),
            failed_tasks: self.counters.failed_tasks.load(Ordering::Relaxed),
        }
    }

    /// Close the queue and block until every worker has drained it and exited.
    ///
    /// Subsequent `schedule` calls fail with `SchedulerError::Shutdown`.
    /// Calling `close` again is a no-op.
    pub fn close(&self) {
        if self.task_tx.lock().take().is_none() {
            return;
        }
        info!(queued_tasks = self.task_rx.len(), "Closing scheduler, draining queue");

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for (worker_id, worker) in workers.into_iter().enumerate() {
            if worker.join().is_err() {
                error!(worker_id, "Worker panicked");
            } else {
                debug!(worker_id, "Worker joined");
            }
        }

        info!(worker_count = self.worker_count, "Scheduler closed");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Close the queue but don't join: explicit close() is the graceful path.
        if self.task_tx.lock().take().is_some() {
            debug!("Scheduler dropped without close - workers will be detached");
        }
        if let Some(runtime) = self.io_runtime.take() {
            release_runtime(runtime);
        }
    }
}

/// Spawn a worker thread that claims and executes tasks until the queue closes.
fn spawn_worker(
    worker_id: usize,
    task_rx: Receiver<Arc<Task>>,
    client: Arc<dyn HttpClient>,
    counters: Arc<SchedulerCounters>,
    io_runtime: Arc<Runtime>,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("fetch-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "Worker thread started");

            // Err only once every sender is gone and the queue is empty.
            while let Ok(task) = task_rx.recv() {
                counters.active_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id, task_id = %task.id(), "Worker claimed task");

                io_runtime.block_on(task.execute(client.as_ref()));

                let status = task.status();
                counters.record_outcome(status);
                counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                debug!(worker_id, task_id = %task.id(), %status, "Worker completed task");
            }

            debug!(worker_id, "Worker queue closed, exiting");
            release_runtime(io_runtime);
        })
}

/// Give up one handle on the I/O runtime, shutting it down if it was the last.
///
/// Every holder must release through here: `Arc::into_inner` hands the runtime
/// to exactly one caller, so it is never dropped implicitly, which would panic
/// inside an async context.
fn release_runtime(io_runtime: Arc<Runtime>) {
    if let Some(runtime) = Arc::into_inner(io_runtime) {
        runtime.shutdown_background();
    }
}
