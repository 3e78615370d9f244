//! Shared test doubles and polling helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fetch_scheduler::core::{
    FetchRequest, FetchResponse, HttpClient, ResponseBody, Task, TaskState, TaskStatus,
};
use parking_lot::Mutex;

/// How the spy answers `send`.
#[derive(Debug, Clone)]
pub enum SpyBehavior {
    /// Respond with the configured status and body.
    Respond,
    /// Fail at the transport level.
    FailSend(String),
    /// Respond, but fail while the body is read.
    FailBodyRead,
    /// Never complete; only cancellation ends the call.
    Hang,
    /// Respond, but never finish reading the body.
    HangBodyRead,
}

/// Body whose release is counted when dropped.
struct SpyBody {
    content: Vec<u8>,
    fail_read: bool,
    hang_read: bool,
    reads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl ResponseBody for SpyBody {
    async fn read_to_end(&mut self) -> anyhow::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang_read {
            return std::future::pending().await;
        }
        if self.fail_read {
            anyhow::bail!("connection reset while reading body");
        }
        Ok(std::mem::take(&mut self.content))
    }
}

impl Drop for SpyBody {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport spy: records requests and counts body releases.
pub struct SpyHttpClient {
    behavior: SpyBehavior,
    status: u16,
    body: String,
    last_request: Mutex<Option<FetchRequest>>,
    requested_urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
    reads: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl SpyHttpClient {
    fn with_behavior(behavior: SpyBehavior, status: u16, body: &str) -> Self {
        Self {
            behavior,
            status,
            body: body.to_owned(),
            last_request: Mutex::new(None),
            requested_urls: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            reads: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn responding(status: u16, body: &str) -> Self {
        Self::with_behavior(SpyBehavior::Respond, status, body)
    }

    pub fn failing_send(message: &str) -> Self {
        Self::with_behavior(SpyBehavior::FailSend(message.to_owned()), 0, "")
    }

    pub fn failing_body_read() -> Self {
        Self::with_behavior(SpyBehavior::FailBodyRead, 200, "")
    }

    pub fn hanging() -> Self {
        Self::with_behavior(SpyBehavior::Hang, 0, "")
    }

    pub fn hanging_body_read() -> Self {
        Self::with_behavior(SpyBehavior::HangBodyRead, 200, "never delivered")
    }

    pub fn last_request(&self) -> Option<FetchRequest> {
        self.last_request.lock().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested_urls.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of body reads started.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for SpyHttpClient {
    async fn send(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested_urls.lock().push(request.url.to_string());
        *self.last_request.lock() = Some(request);

        let (fail_read, hang_read) = match &self.behavior {
            SpyBehavior::FailSend(message) => anyhow::bail!("{message}"),
            SpyBehavior::Hang => return std::future::pending().await,
            SpyBehavior::Respond => (false, false),
            SpyBehavior::FailBodyRead => (true, false),
            SpyBehavior::HangBodyRead => (false, true),
        };

        let headers = HashMap::from([(
            "content-type".to_string(),
            vec!["text/plain".to_string()],
        )]);
        Ok(FetchResponse {
            status: self.status,
            content_length: Some(self.body.len() as u64),
            headers,
            body: Box::new(SpyBody {
                content: self.body.clone().into_bytes(),
                fail_read,
                hang_read,
                reads: Arc::clone(&self.reads),
                releases: Arc::clone(&self.releases),
            }),
        })
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Block until the task reaches a terminal state and return it.
pub fn wait_for_terminal(task: &Task) -> TaskState {
    assert!(
        wait_until(Duration::from_secs(5), || task.status().is_terminal()),
        "task {} did not finish in time (status {})",
        task.id(),
        task.status()
    );
    task.state()
}

/// Async variant of [`wait_until`] for status changes.
pub async fn wait_for_status(task: &Task, status: TaskStatus) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while task.status() != status {
        assert!(Instant::now() < deadline, "task never reached {status}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
