//! HTTP transport for frame requests.

use super::FetchConfig;
use crate::error::FrameError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl FromStr for Method {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            other => Err(FrameError::Protocol(format!(
                "Unsupported method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A fully resolved request for frame content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FrameRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The raw server answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FrameResponse {
    /// Whether the media type is `text/html` (parameters such as charset are ignored).
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case("text/html"))
    }
}

/// Transport failures, split by whether the request ever left the client.
///
/// The underlying primitive does not reliably separate "host unreachable" from other
/// low-level failures, so everything except a request that could not be built counts as
/// unreachable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Host unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed request: {0}")]
    Malformed(String),
}

/// Performs a frame request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: FrameRequest) -> Result<FrameResponse, TransportError>;
}

fn classify_http_error(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::Malformed(error.to_string())
    } else if error.is_timeout() {
        TransportError::Unreachable(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        TransportError::Unreachable(format!("Connection error: {}", error))
    } else {
        TransportError::Unreachable(format!("HTTP error: {}", error))
    }
}

/// `reqwest`-backed transport.
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(config: &FetchConfig) -> Result<Self, FrameError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms));
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| FrameError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Form bodies default to urlencoded and every request asks for HTML unless told otherwise.
    fn request_builder(&self, request: FrameRequest) -> reqwest::RequestBuilder {
        let needs_content_type =
            request.body.is_some() && request.header(CONTENT_TYPE.as_str()).is_none();
        let needs_accept = request.header(ACCEPT.as_str()).is_none();

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if needs_content_type {
            builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        }
        if needs_accept {
            builder = builder.header(ACCEPT, "text/html");
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: FrameRequest) -> Result<FrameResponse, TransportError> {
        let response = self
            .request_builder(request)
            .send()
            .await
            .map_err(classify_http_error)?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(classify_http_error)?;

        Ok(FrameResponse {
            url,
            status,
            content_type,
            body,
        })
    }
}
