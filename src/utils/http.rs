use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;

use super::error::ApiError;

/// A JSON POST to a vendor endpoint.
///
/// No `Debug`: the URL or headers may carry an API key.
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: serde_json::Value,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[cfg(test)]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Converts a non-2xx reply into `ApiError::Http`, passing success through.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Http {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// The network seam shared by the vendor clients.
///
/// Implementations report only transport-level failures as errors; any HTTP
/// status, including 4xx/5xx, comes back as an `HttpResponse`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mcp-pdfcast/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

// reqwest includes the request URL in its error messages, and the Gemini URL
// carries the key as a query parameter.
fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.without_url().to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();
        debug!("Received HTTP {} ({} bytes)", status, body.len());

        Ok(HttpResponse { status, body })
    }
}
