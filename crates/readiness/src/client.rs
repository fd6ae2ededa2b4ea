//! HTTP client abstraction for testability.
//!
//! The prober and the smoke checks only ever issue bounded `GET` requests, so
//! the seam is a single method. Production code uses [`ReqwestHttpClient`];
//! tests supply scripted implementations.

use std::future::Future;
use std::time::Duration;

use crate::error::ProbeError;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Trait abstracting bounded HTTP `GET` requests.
///
/// Any HTTP status is a successful response; only transport failures
/// (connection refused, timeout, TLS) are errors.
pub trait HttpClient: Send + Sync + 'static {
    fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpResponse, ProbeError>> + Send;
}

/// Production client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Builds a client with the stackprobe user agent.
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stackprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, ProbeError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ProbeError::Timeout {
                    url: url.to_owned(),
                }
            } else {
                ProbeError::Request {
                    url: url.to_owned(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_err)?;
        Ok(HttpResponse { status, body })
    }
}
