//! API-facing request/response models and scheduler calls, independent of the HTTP framework.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Scheduler, SchedulerError, Task, TaskId, TaskState, TaskStatus};

/// Task submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Absolute URL to fetch.
    pub url: String,
    /// HTTP method; empty means `GET`.
    #[serde(default)]
    pub method: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

/// Response carrying only a task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdResponse {
    /// Task identifier.
    pub id: TaskId,
}

/// Externally visible view of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    /// Task identifier.
    pub id: TaskId,
    /// Target URL.
    pub url: String,
    /// Current status.
    pub status: TaskStatus,
    /// HTTP status code, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response headers, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, Vec<String>>>,
    /// Announced response length, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    /// Response body, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    /// Failure description, once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        let state = task.state();
        let mut response = Self {
            id: task.id(),
            url: task.url().to_string(),
            status: state.status(),
            status_code: None,
            headers: None,
            content_length: None,
            response_body: None,
            error: None,
        };
        match state {
            TaskState::Finished(outcome) => {
                response.status_code = Some(outcome.status_code);
                response.headers = Some(outcome.headers);
                response.content_length = outcome.content_length;
                response.response_body = Some(outcome.body);
            }
            TaskState::Failed(err) => response.error = Some(err.to_string()),
            TaskState::Ready | TaskState::InProgress => {}
        }
        response
    }
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable message.
    pub error: String,
}

/// Health response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Errors surfaced by the API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is not a valid task submission.
    #[error("could not decode request body")]
    InvalidRequestBody,
    /// The path id is not a valid task identifier.
    #[error("could not parse id of task")]
    InvalidId,
    /// A scheduler operation failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ApiError {
    /// HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequestBody
            | Self::InvalidId
            | Self::Scheduler(SchedulerError::InvalidUrl(_)) => 400,
            Self::Scheduler(SchedulerError::TaskNotFound) => 404,
            Self::Scheduler(SchedulerError::ServiceOverloaded | SchedulerError::Shutdown) => 503,
            Self::Scheduler(_) => 500,
        }
    }

    /// Error payload; internal failures are not described to clients.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        let error = if self.http_status() == 500 {
            "Internal Server Error".to_owned()
        } else {
            self.to_string()
        };
        ErrorResponse { error }
    }
}

/// Parse a task id from a path segment. The nil UUID is rejected.
///
/// # Errors
///
/// Returns `ApiError::InvalidId` if the segment is not a non-nil UUID.
pub fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    match TaskId::parse_str(raw) {
        Ok(id) if !id.is_nil() => Ok(id),
        _ => Err(ApiError::InvalidId),
    }
}

/// Decode a submission body and schedule it.
///
/// # Errors
///
/// Returns `ApiError::InvalidRequestBody` for undecodable JSON, otherwise the
/// scheduler's admission error.
pub fn create_task(scheduler: &Scheduler, body: &[u8]) -> Result<TaskIdResponse, ApiError> {
    let request: CreateTaskRequest =
        serde_json::from_slice(body).map_err(|_| ApiError::InvalidRequestBody)?;
    let task = scheduler.schedule(
        &request.url,
        &request.method,
        request.headers.unwrap_or_default(),
    )?;
    Ok(TaskIdResponse { id: task.id() })
}

/// Views of every stored task.
#[must_use]
pub fn list_tasks(scheduler: &Scheduler) -> Vec<TaskResponse> {
    scheduler
        .find_all()
        .iter()
        .map(|task| TaskResponse::from(task.as_ref()))
        .collect()
}

/// View of one task.
///
/// # Errors
///
/// Returns `ApiError::InvalidId` or `SchedulerError::TaskNotFound`.
pub fn get_task(scheduler: &Scheduler, raw_id: &str) -> Result<TaskResponse, ApiError> {
    let id = parse_task_id(raw_id)?;
    let task = scheduler.find_by_id(&id)?;
    Ok(TaskResponse::from(task.as_ref()))
}

/// Delete a task; unknown ids succeed.
///
/// # Errors
///
/// Returns `ApiError::InvalidId` if the id does not parse.
pub fn delete_task(scheduler: &Scheduler, raw_id: &str) -> Result<TaskIdResponse, ApiError> {
    let id = parse_task_id(raw_id)?;
    scheduler.delete(&id);
    Ok(TaskIdResponse { id })
}

/// Return a health payload.
#[must_use]
pub const fn health() -> Health {
    Health { ok: true }
}
