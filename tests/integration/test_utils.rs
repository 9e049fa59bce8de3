//! Shared test utilities for integration tests
//!
//! A scripted in-process server and helpers for building pages.

use async_trait::async_trait;
use framewire::dom::{Document, NodeId};
use framewire::fetch::{FrameRequest, FrameResponse, HttpClient, TransportError};
use framewire::page::{Page, SharedPage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Canned answer for one URL.
#[derive(Clone)]
pub enum Reply {
    Html {
        status: u16,
        body: String,
        delay: Option<Duration>,
    },
    Unreachable(String),
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Html {
            status: 200,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Reply::Html {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(body: &str, millis: u64) -> Self {
        Reply::Html {
            status: 200,
            body: body.to_string(),
            delay: Some(Duration::from_millis(millis)),
        }
    }
}

/// In-process stand-in for the rendering server, keyed by absolute URL.
#[derive(Default)]
pub struct StubServer {
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<FrameRequest>>,
}

impl StubServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(self: &Arc<Self>, url: &str, reply: Reply) -> Arc<Self> {
        self.routes.lock().insert(url.to_string(), reply);
        self.clone()
    }

    pub fn requests(&self) -> Vec<FrameRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for StubServer {
    async fn send(&self, request: FrameRequest) -> Result<FrameResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let reply = self.routes.lock().get(&request.url).cloned();
        match reply {
            Some(Reply::Html {
                status,
                body,
                delay,
            }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(FrameResponse {
                    url: request.url,
                    status,
                    content_type: Some("text/html; charset=utf-8".to_string()),
                    body,
                })
            }
            Some(Reply::Unreachable(message)) => Err(TransportError::Unreachable(message)),
            None => Ok(FrameResponse {
                url: request.url,
                status: 404,
                content_type: Some("text/html".to_string()),
                body: "<body><h1>Not Found</h1></body>".to_string(),
            }),
        }
    }
}

pub fn shared_page(markup: &str) -> SharedPage {
    Page::new(Document::parse(markup).unwrap()).shared()
}

pub fn element(page: &SharedPage, id: &str) -> NodeId {
    page.lock()
        .document
        .get_element_by_id(id)
        .unwrap_or_else(|| panic!("no element #{}", id))
}

pub fn text_of(page: &SharedPage, id: &str) -> String {
    let node = element(page, id);
    page.lock().document.text_content(node)
}

/// Serializes environment mutation across tests in this binary.
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Run `f` with the given environment variables set (`Some`) or removed (`None`), restoring
/// the previous values afterwards.
pub fn with_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let saved: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(name, _)| (name.to_string(), std::env::var(name).ok()))
        .collect();
    for (name, value) in vars {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
    }
    let result = f();
    for (name, value) in saved {
        match value {
            Some(value) => std::env::set_var(&name, value),
            None => std::env::remove_var(&name),
        }
    }
    result
}
