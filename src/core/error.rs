//! Error types for scheduler operations and fetch outcomes.

use thiserror::Error;

/// Errors returned synchronously by scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The task URL could not be parsed; no task was created.
    #[error("given url is invalid: {0}")]
    InvalidUrl(String),
    /// The pending queue had no free slot at admission time.
    #[error("too many requests are being handled, service overloaded")]
    ServiceOverloaded,
    /// No task is stored under the requested identifier.
    #[error("could not find task with given id")]
    TaskNotFound,
    /// The scheduler has been closed and accepts no more tasks.
    #[error("scheduler has been shut down")]
    Shutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread or the I/O runtime could not be started.
    #[error("failed to start worker: {0}")]
    WorkerSpawn(String),
}

/// Execution failures recorded on a task rather than returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The outbound request could not be built (bad method token, bad header).
    #[error("fail when create a http request: {0}")]
    RequestConstruction(String),
    /// The transport failed or the request was cancelled.
    #[error("fail when send a http request: {0}")]
    Transport(String),
    /// The response body could not be read in full.
    #[error("fail when read response body: {0}")]
    BodyRead(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
