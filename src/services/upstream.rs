use crate::constants::network::{ALLOWED_SCHEMES, USER_AGENT};
use crate::errors::{ToolError, UpstreamError};
use crate::services::logger::Logger;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// One outgoing call. Built by handlers, executed by an [`Upstream`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            bearer: None,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, url).with_body(body)
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Executes upstream calls. No retries and no caching: one request, one outcome.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, UpstreamError>;
}

pub struct HttpUpstream {
    client: Client,
    logger: Logger,
}

impl HttpUpstream {
    pub fn new(logger: Logger, timeout: Duration) -> Result<Self, ToolError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self {
            client,
            logger: logger.child("upstream"),
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<Value, UpstreamError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.bearer.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| UpstreamError::Transport("API token is not a valid header value".to_string()))?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        self.logger.debug(
            "upstream call",
            Some(&serde_json::json!({
                "method": request.method.as_str(),
                "url": request.url,
                "status": status.as_u16(),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );

        if !status.is_success() {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// Appends percent-encoded path segments to `base`.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<String, ToolError> {
    let mut url = Url::parse(base)
        .map_err(|_| ToolError::config(format!("Invalid upstream base URL: {}", base)))?;
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(ToolError::config("Only http/https upstreams are supported"));
    }
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ToolError::config(format!("Upstream base URL cannot carry a path: {}", base)))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url.to_string())
}
