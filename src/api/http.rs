//! HTTP transport for the finance tracker REST API

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// A request resolved against one backend generation
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path starting with `/api/`, segments already percent-encoded
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response: status plus the undecoded body text
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The call never produced a response
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Network client used by the executors.
///
/// One attempt per call: implementations must not retry and must not impose
/// a timeout of their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport with a cookie store so session cookies set by the
/// authentication collaborator ride along on every call
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a new transport rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("finsync/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()
            .context("Failed to create HTTP client")?;

        Self::with_client(base_url, client)
    }

    /// Wrap an existing reqwest client
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
        // Request paths are joined relative to the base, so it must end in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// Resolve an `/api/...` path below the base URL, keeping any path prefix
    /// such as `http://host/finance/`
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError(format!("Invalid request path {}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response body: {}", e)))?;

        if !(200..300).contains(&status) {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
        }

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("bad\nthing\r\n"), "badthing");
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = format!("{}é{}", "a".repeat(199), "b".repeat(50));
        let out = sanitize_for_log(&body);
        assert!(out.contains("truncated"));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(ReqwestTransport::new("not a url").is_err());
    }

    #[test]
    fn test_url_for_joins_absolute_paths() {
        let transport = ReqwestTransport::new("http://localhost:8443/").unwrap();
        let url = transport.url_for("/api/account/active").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8443/api/account/active");
    }

    #[test]
    fn test_url_for_keeps_base_path_prefix() {
        for base in ["http://host/finance/", "http://host/finance"] {
            let transport = ReqwestTransport::new(base).unwrap();
            let url = transport.url_for("/api/account/active").unwrap();
            assert_eq!(url.as_str(), "http://host/finance/api/account/active");
        }
    }
}
