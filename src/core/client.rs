//! Outbound HTTP capability injected into the scheduler.
//!
//! The scheduler never talks to the network itself. Every fetch goes through an
//! [`HttpClient`] supplied at construction time, which makes the transport easy to
//! swap for a spy in tests and keeps connection pooling, TLS and timeouts out of
//! the scheduling core.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use fetch_scheduler::core::{FetchRequest, FetchResponse, HttpClient};
//!
//! struct Refusing;
//!
//! #[async_trait]
//! impl HttpClient for Refusing {
//!     async fn send(&self, _request: FetchRequest) -> anyhow::Result<FetchResponse> {
//!         anyhow::bail!("connection refused")
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Validated HTTP method.
    pub method: Method,
    /// Absolute target URL.
    pub url: Url,
    /// Headers applied to the request, one value per name.
    pub headers: HeaderMap,
}

/// Response returned by an [`HttpClient`] once headers have arrived.
///
/// The body is read separately through [`ResponseBody`]; dropping the response
/// (or the body) releases the underlying resource.
pub struct FetchResponse {
    /// HTTP status code. Non-2xx codes are not failures.
    pub status: u16,
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    /// Response header multimap.
    pub headers: HashMap<String, Vec<String>>,
    /// Response body resource.
    pub body: Box<dyn ResponseBody>,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Readable response body. Released when dropped.
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the remaining body to the end.
    async fn read_to_end(&mut self) -> anyhow::Result<Vec<u8>>;
}

/// Abstract outbound HTTP capability with a single operation.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send a request and return the response head plus body handle.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport-level failures (DNS, connect, TLS,
    /// cancellation). HTTP error statuses are successful responses.
    async fn send(&self, request: FetchRequest) -> anyhow::Result<FetchResponse>;
}
