//! Task lifecycle: one fetch specification and its execution outcome.
//!
//! A task moves `READY -> IN_PROGRESS -> FINISHED | FAILED` exactly once, driven by
//! the single worker that claimed it. The outcome lives in [`TaskState`], so a
//! finished task carries a [`FetchOutcome`] and a failed one carries a
//! [`FetchError`], never both.

use std::collections::HashMap;
use std::fmt;

use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::client::{FetchRequest, FetchResponse, HttpClient};
use super::error::{FetchError, SchedulerError};

/// Opaque task identifier.
pub type TaskId = Uuid;

/// Status label of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created and waiting in the queue.
    Ready,
    /// Claimed by a worker; the fetch is running.
    InProgress,
    /// Fetch completed and the response was recorded.
    Finished,
    /// Fetch failed; the error was recorded.
    Failed,
}

impl TaskStatus {
    /// Wire label of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// HTTP status code.
    pub status_code: u16,
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    /// Response header multimap.
    pub headers: HashMap<String, Vec<String>>,
    /// Body decoded as text.
    pub body: String,
}

/// Mutable execution state of a task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Waiting to be claimed.
    #[default]
    Ready,
    /// Being executed.
    InProgress,
    /// Completed with a response.
    Finished(FetchOutcome),
    /// Completed with an error.
    Failed(FetchError),
}

impl TaskState {
    /// Status label for this state.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        match self {
            Self::Ready => TaskStatus::Ready,
            Self::InProgress => TaskStatus::InProgress,
            Self::Finished(_) => TaskStatus::Finished,
            Self::Failed(_) => TaskStatus::Failed,
        }
    }

    /// Response data, present only once finished.
    #[must_use]
    pub const fn outcome(&self) -> Option<&FetchOutcome> {
        match self {
            Self::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Failure, present only once failed.
    #[must_use]
    pub const fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// A single outbound fetch and its lifecycle record.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    method: String,
    url: Url,
    headers: HashMap<String, String>,
    state: RwLock<TaskState>,
    /// Present only while the fetch is in flight.
    cancel: Mutex<Option<CancellationToken>>,
}

impl Task {
    /// Create a task from a fetch specification.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidUrl` if `raw_url` is not a valid absolute URL.
    /// No identifier is allocated in that case.
    pub fn new(
        method: impl Into<String>,
        raw_url: &str,
        headers: HashMap<String, String>,
    ) -> Result<Self, SchedulerError> {
        let url = parse_task_url(raw_url)?;
        Ok(Self {
            id: Uuid::new_v4(),
            method: method.into(),
            url,
            headers,
            state: RwLock::new(TaskState::Ready),
            cancel: Mutex::new(None),
        })
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Requested HTTP method, verbatim.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Target URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Current status label.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.state.read().status()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state.read().clone()
    }

    /// Request cancellation of the in-flight fetch.
    ///
    /// Has no effect before execution starts or after it completes.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.lock().as_ref() {
            debug!(task_id = %self.id, "Cancelling in-flight fetch");
            token.cancel();
        }
    }

    /// Run the fetch through `client` and record the outcome on the task.
    ///
    /// Only a `READY` task is executed; any other state is left untouched.
    pub async fn execute(&self, client: &dyn HttpClient) {
        let token = CancellationToken::new();
        {
            let mut state = self.state.write();
            if *state != TaskState::Ready {
                warn!(task_id = %self.id, status = %state.status(), "Task already claimed, skipping");
                return;
            }
            *self.cancel.lock() = Some(token.clone());
            *state = TaskState::InProgress;
        }

        let next = match self.fetch(client, &token).await {
            Ok(outcome) => {
                debug!(task_id = %self.id, status_code = outcome.status_code, "Fetch finished");
                TaskState::Finished(outcome)
            }
            Err(err) => {
                warn!(task_id = %self.id, error = %err, "Fetch failed");
                TaskState::Failed(err)
            }
        };

        self.cancel.lock().take();
        self.finish(next);
    }

    fn finish(&self, next: TaskState) {
        let mut state = self.state.write();
        if state.status().is_terminal() {
            warn!(task_id = %self.id, status = %state.status(), "Refusing to leave terminal state");
            return;
        }
        *state = next;
    }

    async fn fetch(
        &self,
        client: &dyn HttpClient,
        token: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let request = self.build_request()?;

        let response = tokio::select! {
            () = token.cancelled() => return Err(cancelled()),
            sent = client.send(request) => {
                sent.map_err(|e| FetchError::Transport(format!("{e:#}")))?
            }
        };

        let FetchResponse {
            status,
            content_length,
            headers,
            mut body,
        } = response;

        // `body` is dropped on every return below, which releases it exactly once.
        let bytes = tokio::select! {
            () = token.cancelled() => return Err(cancelled()),
            read = body.read_to_end() => {
                read.map_err(|e| FetchError::BodyRead(format!("{e:#}")))?
            }
        };
        drop(body);

        Ok(FetchOutcome {
            status_code: status,
            content_length,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn build_request(&self) -> Result<FetchRequest, FetchError> {
        let method = if self.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(self.method.as_bytes()).map_err(|e| {
                FetchError::RequestConstruction(format!("method {:?}: {e}", self.method))
            })?
        };

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                FetchError::RequestConstruction(format!("header name {name:?}: {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                FetchError::RequestConstruction(format!("header {name:?} value: {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(FetchRequest {
            method,
            url: self.url.clone(),
            headers,
        })
    }
}

fn cancelled() -> FetchError {
    FetchError::Transport("request cancelled".into())
}

fn parse_task_url(raw: &str) -> Result<Url, SchedulerError> {
    if host_has_escaped_ascii(raw) {
        return Err(SchedulerError::InvalidUrl(format!(
            "{raw}: percent-escaped ASCII in host"
        )));
    }
    Url::parse(raw).map_err(|e| SchedulerError::InvalidUrl(format!("{raw}: {e}")))
}

/// Percent-escapes in a host may only encode non-ASCII bytes (or `%25` for an IPv6 zone).
///
/// The authority is located the way the URL parser does: leading and trailing
/// control characters are trimmed, tabs and newlines are ignored, and special
/// schemes accept any run of `/` or `\\` after the colon.
fn host_has_escaped_ascii(raw: &str) -> bool {
    let cleaned: String = raw
        .trim_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let Some((scheme, rest)) = cleaned.split_once(':') else {
        return false;
    };
    let rest = if is_special_scheme(scheme) {
        rest.trim_start_matches(['/', '\\'])
    } else if let Some(rest) = rest.strip_prefix("//") {
        rest
    } else {
        return false;
    };
    let authority = rest.split(['/', '\\', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    host.as_bytes().windows(3).any(|w| {
        w[0] == b'%' && decode_escape(&w[1..]).is_some_and(|b| b.is_ascii() && b != b'%')
    })
}

fn is_special_scheme(scheme: &str) -> bool {
    ["http", "https", "ws", "wss", "ftp", "file"]
        .iter()
        .any(|special| scheme.eq_ignore_ascii_case(special))
}

fn decode_escape(pair: &[u8]) -> Option<u8> {
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()
}
