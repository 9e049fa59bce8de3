//! Document-level link and form interception.
//!
//! Links and forms carrying the frame target attribute (`data-frame` by default) refresh the
//! named frame instead of navigating the whole page. Listeners live on the document root for
//! the lifetime of the page.

use crate::coordinator::FrameCoordinator;
use crate::dom::{Document, FrameSelector, NodeId};
use crate::error::FrameError;
use crate::events::{Event, Handler, ListenerOptions, CLICK_EVENT, SUBMIT_EVENT};
use crate::fetch::{FetchOptions, FrameFetcher, Method};
use crate::runtime::{refresh_with, FrameRuntime};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// A frame request derived from a link or form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub frame: FrameSelector,
    pub url: String,
    pub method: Method,
    pub body: Option<String>,
}

impl Navigation {
    fn options(&self) -> FetchOptions {
        FetchOptions {
            method: self.method,
            body: self.body.clone(),
            headers: Vec::new(),
        }
    }
}

#[derive(Clone)]
struct Delegate {
    coordinator: Weak<FrameCoordinator>,
    fetcher: FrameFetcher,
    target_attribute: String,
    handle: Handle,
}

impl Delegate {
    fn intercept(&self, event: &Event, resolve: fn(&Document, NodeId, &str) -> Option<Navigation>) {
        let Some(coordinator) = self.coordinator.upgrade() else {
            return;
        };
        let navigation = {
            let page = coordinator.page().lock();
            resolve(&page.document, event.target(), &self.target_attribute)
        };
        let Some(navigation) = navigation else {
            return;
        };
        event.prevent_default();
        debug!(
            event = event.name(),
            frame = %navigation.frame,
            url = %navigation.url,
            "Intercepted navigation"
        );

        let fetcher = self.fetcher.clone();
        self.handle.spawn(async move {
            let result = refresh_with(
                &coordinator,
                &fetcher,
                &navigation.frame,
                &navigation.url,
                navigation.options(),
            )
            .await;
            match result {
                Err(e) if !e.is_cancellation() => warn!(
                    frame = %navigation.frame,
                    url = %navigation.url,
                    error = %e,
                    "Delegated frame refresh failed"
                ),
                _ => {}
            }
        });
    }
}

impl FrameRuntime {
    /// Register the document-level click and submit listeners.
    ///
    /// Returns `false` when delegation was already installed. Must be called from within a
    /// Tokio runtime; refreshes are spawned onto it.
    pub fn install_delegation(&self) -> Result<bool, FrameError> {
        let handle = Handle::try_current().map_err(|e| {
            FrameError::Config(format!("Delegation requires a Tokio runtime: {}", e))
        })?;
        if self.delegation_installed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let delegate = Delegate {
            coordinator: Arc::downgrade(self.coordinator()),
            fetcher: self.fetcher().clone(),
            target_attribute: self.config().markup.frame_target_attribute.clone(),
            handle,
        };
        let on_click: Handler = {
            let delegate = delegate.clone();
            Arc::new(move |event: &Event| delegate.intercept(event, link_navigation))
        };
        let on_submit: Handler =
            Arc::new(move |event: &Event| delegate.intercept(event, form_navigation));

        let mut page = self.page().lock();
        let root = page.document.root();
        page.document
            .add_listener(root, CLICK_EVENT, on_click, ListenerOptions::default());
        page.document
            .add_listener(root, SUBMIT_EVENT, on_submit, ListenerOptions::default());
        debug!("Installed document delegation");
        Ok(true)
    }
}

/// The navigation implied by clicking `target`: the nearest `<a href>` carrying the frame
/// target attribute.
pub fn link_navigation(doc: &Document, target: NodeId, attribute: &str) -> Option<Navigation> {
    let link = doc.closest(target, "a")?;
    let href = doc.get_attribute(link, "href")?;
    let frame = doc.get_attribute(link, attribute)?.parse().ok()?;
    Some(Navigation {
        frame,
        url: href.to_string(),
        method: Method::Get,
        body: None,
    })
}

/// The navigation implied by submitting the form enclosing `target`.
pub fn form_navigation(doc: &Document, target: NodeId, attribute: &str) -> Option<Navigation> {
    let form = doc.closest(target, "form")?;
    let frame = doc.get_attribute(form, attribute)?.parse().ok()?;
    let action = doc
        .get_attribute(form, "action")
        .or_else(|| doc.location())?
        .to_string();
    let method = doc
        .get_attribute(form, "method")
        .and_then(|m| m.parse().ok())
        .unwrap_or_default();

    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form_fields(doc, form))
        .finish();

    let (url, body) = match method {
        Method::Get if encoded.is_empty() => (action, None),
        Method::Get => {
            let separator = if action.contains('?') { '&' } else { '?' };
            (format!("{}{}{}", action, separator, encoded), None)
        }
        Method::Post => (action, Some(encoded)),
    };
    Some(Navigation {
        frame,
        url,
        method,
        body,
    })
}

/// Successful controls of `form` in document order.
pub fn form_fields(doc: &Document, form: NodeId) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for node in doc.descendants(form) {
        let Some(tag) = doc.tag_name(node) else {
            continue;
        };
        let Some(name) = doc.get_attribute(node, "name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if doc.has_attribute(node, "disabled") {
            continue;
        }
        let value = match tag {
            "input" => {
                let kind = doc
                    .get_attribute(node, "type")
                    .unwrap_or("text")
                    .to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "reset" | "file" | "image" => continue,
                    "checkbox" | "radio" if !doc.has_attribute(node, "checked") => continue,
                    "checkbox" | "radio" => {
                        doc.get_attribute(node, "value").unwrap_or("on").to_string()
                    }
                    _ => doc.get_attribute(node, "value").unwrap_or_default().to_string(),
                }
            }
            "textarea" => doc.text_content(node),
            "select" => {
                let options = doc.elements_by_tag(node, "option");
                let chosen = options
                    .iter()
                    .copied()
                    .find(|&o| doc.has_attribute(o, "selected"))
                    .or_else(|| options.first().copied());
                match chosen {
                    Some(option) => doc
                        .get_attribute(option, "value")
                        .map(str::to_string)
                        .unwrap_or_else(|| doc.text_content(option)),
                    None => continue,
                }
            }
            _ => continue,
        };
        fields.push((name.to_string(), value));
    }
    fields
}
