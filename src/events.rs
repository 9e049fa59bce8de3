//! Events and the Listener Registry
//!
//! Native listener storage lives on the [`Document`]. The [`EventRegistry`] is the runtime's own
//! side-table of the listeners *it* attached, keyed by element identity, so every one of them
//! can be detached in one step right before the element is reconciled.

use crate::dom::{Document, NodeId};
use crate::error::FrameError;
use crate::fetch::FrameResponse;
use crate::page::SharedPage;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Dispatched on a frame when its request could not reach the server.
pub const NETWORK_ERROR_EVENT: &str = "framewire:network-error";

/// Dispatched on a frame when the response did not contain it.
pub const FRAME_MISSING_EVENT: &str = "framewire:frame-missing";

pub const CLICK_EVENT: &str = "click";
pub const SUBMIT_EVENT: &str = "submit";

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle identifying one native listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) name: String,
    pub(crate) handler: Handler,
    pub(crate) options: ListenerOptions,
}

/// Payload carried by an event.
#[derive(Debug, Clone)]
pub enum EventDetail {
    None,
    NetworkError { url: String, message: String },
    FrameMissing {
        response: FrameResponse,
        /// Root of the parsed payload (detached, in the live arena).
        payload: NodeId,
    },
    Click,
    Submit,
    Custom(serde_json::Value),
}

pub struct Event {
    name: String,
    target: NodeId,
    bubbles: bool,
    cancelable: bool,
    detail: EventDetail,
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("default_prevented", &self.default_prevented())
            .finish()
    }
}

impl Event {
    /// A non-bubbling, non-cancelable event.
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            bubbles: false,
            cancelable: false,
            detail: EventDetail::None,
            default_prevented: AtomicBool::new(false),
            propagation_stopped: AtomicBool::new(false),
        }
    }

    pub fn bubbling(mut self) -> Self {
        self.bubbles = true;
        self
    }

    pub fn cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// No-op unless the event is cancelable.
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.store(true, Ordering::Release);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Acquire)
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::Release);
    }
}

/// Dispatch `event` at its target and, when bubbling, each ancestor in turn.
///
/// Handlers run without the page lock held, so they may lock the page themselves.
/// Returns `false` iff a handler called `prevent_default`.
pub fn dispatch_event(page: &SharedPage, event: &Event) -> bool {
    let path: Vec<NodeId> = {
        let page = page.lock();
        let doc = &page.document;
        if !doc.exists(event.target) {
            return true;
        }
        let mut path = vec![event.target];
        if event.bubbles {
            let mut cursor = doc.parent(event.target);
            while let Some(node) = cursor {
                path.push(node);
                cursor = doc.parent(node);
            }
        }
        path
    };

    for node in path {
        let handlers = page.lock().document.take_handlers(node, &event.name);
        for handler in handlers {
            handler(event);
        }
        if event.propagation_stopped.load(Ordering::Acquire) {
            break;
        }
    }

    trace!(
        event = %event.name,
        prevented = event.default_prevented(),
        "Event dispatched"
    );
    !event.default_prevented()
}

/// Side-table of listeners attached through the runtime, per element.
#[derive(Debug, Default)]
pub struct EventRegistry {
    registrations: HashMap<NodeId, Vec<ListenerId>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to the element whose `id` attribute is `element_id`.
    pub fn add_event_listener(
        &mut self,
        doc: &mut Document,
        element_id: &str,
        name: &str,
        handler: Handler,
        options: ListenerOptions,
    ) -> Result<ListenerId, FrameError> {
        let node = doc
            .get_element_by_id(element_id)
            .ok_or_else(|| FrameError::NotFound(format!("#{}", element_id)))?;
        self.add_listener_to(doc, node, name, handler, options)
            .ok_or_else(|| FrameError::NotFound(format!("#{}", element_id)))
    }

    /// Attach a listener to a node directly.
    pub fn add_listener_to(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        name: &str,
        handler: Handler,
        options: ListenerOptions,
    ) -> Option<ListenerId> {
        let id = doc.add_listener(node, name, handler, options)?;
        self.registrations.entry(node).or_default().push(id);
        Some(id)
    }

    /// Detach every listener recorded for `node`. Returns how many were removed.
    pub fn remove_event_listeners(&mut self, doc: &mut Document, node: NodeId) -> usize {
        let Some(ids) = self.registrations.remove(&node) else {
            return 0;
        };
        ids.into_iter()
            .filter(|&id| doc.remove_listener(node, id))
            .count()
    }

    /// Number of recorded registrations for `node`.
    pub fn registered(&self, node: NodeId) -> usize {
        self.registrations.get(&node).map(Vec::len).unwrap_or(0)
    }

    /// Drop bookkeeping for nodes that no longer exist.
    pub(crate) fn forget<I: IntoIterator<Item = NodeId>>(&mut self, nodes: I) {
        for node in nodes {
            self.registrations.remove(&node);
        }
    }
}
