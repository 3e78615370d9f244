//! `reqwest`-backed HTTP capability.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::core::{FetchRequest, FetchResponse, HttpClient, ResponseBody};

/// Production transport over a shared `reqwest::Client` connection pool.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Client with reqwest defaults (no overall timeout).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already configured `reqwest::Client`.
    #[must_use]
    pub const fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Client that aborts any fetch taking longer than `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
        let response = self
            .inner
            .request(request.method, request.url)
            .headers(request.headers)
            .send()
            .await?;

        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            headers: header_multimap(response.headers()),
            body: Box::new(ReqwestBody(Some(response))),
        })
    }
}

/// Body handle; the connection goes back to the pool when this is dropped.
struct ReqwestBody(Option<reqwest::Response>);

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn read_to_end(&mut self) -> anyhow::Result<Vec<u8>> {
        let Some(response) = self.0.take() else {
            anyhow::bail!("response body already consumed");
        };
        Ok(response.bytes().await?.to_vec())
    }
}

fn header_multimap(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        map.entry(name.as_str().to_owned())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_header_multimap_keeps_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let map = header_multimap(&headers);
        assert_eq!(map["set-cookie"], vec!["a=1", "b=2"]);
        assert_eq!(map["content-type"], vec!["text/plain"]);
    }
}
