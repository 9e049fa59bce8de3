//! Frame fetching
//!
//! Requests frame content from the server, tagging the request with the originating frame, and
//! extracts the matching frame element from the returned document. Transport failures and
//! responses without the frame are announced as cancelable events on the frame before the
//! default fallback runs.

pub mod client;

pub use client::{FrameRequest, FrameResponse, HttpClient, Method, ReqwestClient, TransportError};

use crate::cancel::CancellationToken;
use crate::dom::{Document, FrameSelector, NodeId};
use crate::error::FrameError;
use crate::events::{dispatch_event, Event, EventDetail, FRAME_MISSING_EVENT, NETWORK_ERROR_EVENT};
use crate::page::SharedPage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base against which relative frame URLs are resolved
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request header naming the originating frame
    #[serde(default = "default_frame_header")]
    pub frame_header: String,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_frame_header() -> String {
    "X-Frame-Id".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            frame_header: default_frame_header(),
            user_agent: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|e| format!("Invalid base_url {:?}: {}", base, e))?;
        }
        if self.frame_header.trim().is_empty() {
            return Err("frame_header cannot be empty".to_string());
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Resolve `url` against `base_url`. Absolute URLs pass through.
    pub fn resolve_url(&self, url: &str) -> Result<String, FrameError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_deref().ok_or_else(|| {
                    FrameError::Protocol(format!("Relative URL {:?} without a base_url", url))
                })?;
                Url::parse(base)
                    .and_then(|base| base.join(url))
                    .map(|joined| joined.to_string())
                    .map_err(|e| FrameError::Protocol(format!("Cannot resolve {:?}: {}", url, e)))
            }
            Err(e) => Err(FrameError::Protocol(format!("Invalid URL {:?}: {}", url, e))),
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    /// Encoded request body (form submissions send `application/x-www-form-urlencoded`)
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            body: Some(body.into()),
            headers: Vec::new(),
        }
    }
}

/// Fetches frame content and extracts the frame element from it.
#[derive(Clone)]
pub struct FrameFetcher {
    client: Arc<dyn HttpClient>,
    config: FetchConfig,
}

impl FrameFetcher {
    pub fn new(client: Arc<dyn HttpClient>, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Request `url` on behalf of `frame`.
    ///
    /// The request carries the frame id in the configured header (the body frame sends none)
    /// and is abandoned as soon as `signal` is cancelled. On a transport failure a
    /// `framewire:network-error` event bubbles from the frame; unless a handler prevents it,
    /// the page falls back to a full navigation to `url`. The error is returned either way.
    pub async fn fetch_frame(
        &self,
        page: &SharedPage,
        frame: NodeId,
        url: &str,
        options: FetchOptions,
        signal: &CancellationToken,
    ) -> Result<FrameResponse, FrameError> {
        signal.check()?;
        let url = self.config.resolve_url(url)?;

        let selector = {
            let page = page.lock();
            FrameSelector::for_element(&page.document, frame)
        };
        let mut headers = options.headers;
        if let Some(id) = selector.as_ref().and_then(FrameSelector::header_value) {
            headers.push((self.config.frame_header.clone(), id.to_string()));
        }
        let request = FrameRequest {
            url: url.clone(),
            method: options.method,
            headers,
            body: options.body,
        };
        debug!(%url, method = %request.method, frame = ?selector, "Fetching frame");

        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(FrameError::Cancelled),
            result = self.client.send(request) => result,
        };

        match outcome {
            Ok(response) => {
                debug!(%url, status = response.status, "Frame response received");
                Ok(response)
            }
            Err(TransportError::Malformed(message)) => Err(FrameError::Protocol(format!(
                "Malformed request to {}: {}",
                url, message
            ))),
            Err(TransportError::Unreachable(message)) => {
                warn!(%url, error = %message, "Frame request failed");
                let event = Event::new(NETWORK_ERROR_EVENT, frame)
                    .bubbling()
                    .cancelable()
                    .with_detail(EventDetail::NetworkError {
                        url: url.clone(),
                        message: message.clone(),
                    });
                if dispatch_event(page, &event) {
                    info!(%url, "Falling back to full navigation");
                    page.lock().document.navigate(&url);
                }
                Err(FrameError::Network { url, message })
            }
        }
    }

    /// Extract the element matching `frame` from a server response.
    ///
    /// The body is parsed off the async executor and the matching subtree is copied into the
    /// page arena as a detached tree. When the response lacks the frame a
    /// `framewire:frame-missing` event bubbles from the frame. If nobody prevents it and the
    /// status is 300 or above, the whole response body is rendered inside a copy of the frame
    /// so the user sees the server's error page; otherwise the update fails.
    pub async fn extract_frame_from_response(
        &self,
        page: &SharedPage,
        frame: NodeId,
        response: &FrameResponse,
        signal: &CancellationToken,
    ) -> Result<NodeId, FrameError> {
        if !response.is_html() {
            return Err(FrameError::Protocol(format!(
                "Expected text/html from {}, got {}",
                response.url,
                response.content_type.as_deref().unwrap_or("no content type")
            )));
        }

        let body = response.body.clone();
        let parsed = tokio::task::spawn_blocking(move || Document::parse(&body))
            .await
            .map_err(|e| FrameError::Protocol(format!("HTML parsing task failed: {}", e)))??;
        signal.check()?;

        let selector = {
            let page = page.lock();
            FrameSelector::for_element(&page.document, frame)
        }
        .ok_or_else(|| FrameError::NotFound(format!("{:?} is not a frame", frame)))?;

        if let Some(found) = selector.locate_in(&parsed, parsed.body()) {
            let mut guard = page.lock();
            return guard
                .document
                .import(&parsed, found)
                .ok_or_else(|| FrameError::NotFound(selector.to_string()));
        }

        let payload = page
            .lock()
            .document
            .import(&parsed, parsed.body())
            .ok_or_else(|| FrameError::Protocol("Response has no body".to_string()))?;
        warn!(
            frame = %selector,
            url = %response.url,
            status = response.status,
            "Frame missing from response"
        );

        let event = Event::new(FRAME_MISSING_EVENT, frame)
            .bubbling()
            .cancelable()
            .with_detail(EventDetail::FrameMissing {
                response: response.clone(),
                payload,
            });
        let proceed = dispatch_event(page, &event);

        let mut guard = page.lock();
        if proceed && response.status >= 300 {
            if let Some(shell) = guard.document.shallow_clone(frame) {
                info!(
                    frame = %selector,
                    status = response.status,
                    "Rendering error response inside frame"
                );
                let children = guard.document.children(payload).to_vec();
                for child in children {
                    guard.document.append_child(shell, child);
                }
                guard.discard(payload);
                return Ok(shell);
            }
        }
        guard.discard(payload);
        Err(FrameError::Protocol(format!(
            "Frame {} missing from response to {} (status {})",
            selector, response.url, response.status
        )))
    }

    /// Fetch `url` for `frame` and extract the new frame element.
    pub async fn load(
        &self,
        page: &SharedPage,
        frame: NodeId,
        url: &str,
        options: FetchOptions,
        signal: &CancellationToken,
    ) -> Result<NodeId, FrameError> {
        let response = self.fetch_frame(page, frame, url, options, signal).await?;
        self.extract_frame_from_response(page, frame, &response, signal)
            .await
    }
}
