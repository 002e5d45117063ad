// Underlying request function
// The Transport seam and its reqwest-backed implementation

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use std::time::Duration;

use crate::error::Result;

/// Per-request options passed through the interceptor
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Append a header to the request
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set Content-Type
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).context("Failed to serialize JSON body")?;
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A request function: `fetch(url, config) -> Response`
///
/// Implemented by the plain reqwest transport and by the interceptor itself,
/// so an interceptor can wrap another transport or be installed as the
/// ambient request function.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, config: RequestConfig) -> Result<Response>;
}

/// Transport backed by a pooled reqwest client with a cookie store
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new transport
    pub fn new(
        max_connections: usize,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &str, config: RequestConfig) -> Result<Response> {
        let mut builder = self
            .client
            .request(config.method, url)
            .headers(config.headers);

        if let Some(body) = config.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder.send().await?)
    }
}

/// Categorize a reqwest error for diagnostics
pub fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_builder() {
        "invalid_request"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

/// Scripted in-memory transport for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// A request as seen by the mock transport
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub url: String,
        pub method: Method,
        pub headers: HeaderMap,
        pub body: Option<Bytes>,
    }

    /// Replies with queued `(status, body)` pairs, then 200 with an empty body
    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<VecDeque<(u16, String)>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_responses(responses: &[(u16, &str)]) -> Self {
            let mock = Self::new();
            for (status, body) in responses {
                mock.push(*status, body);
            }
            mock
        }

        pub fn push(&self, status: u16, body: &str) {
            self.responses.lock().push_back((status, body.to_string()));
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn fetch(&self, url: &str, config: RequestConfig) -> Result<Response> {
            self.calls.lock().push(RecordedCall {
                url: url.to_string(),
                method: config.method,
                headers: config.headers,
                body: config.body,
            });

            let (status, body) = self
                .responses
                .lock()
                .pop_front()
                .unwrap_or((200, String::new()));

            let response = http::Response::builder()
                .status(status)
                .body(body)
                .context("Failed to build mock response")?;

            Ok(Response::from(response))
        }
    }
}
