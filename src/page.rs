//! Shared page state: the live document and the runtime's listener registry.

use crate::dom::{Document, NodeId};
use crate::events::EventRegistry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to the page. Never hold the lock across an `.await`.
pub type SharedPage = Arc<Mutex<Page>>;

#[derive(Debug, Default)]
pub struct Page {
    pub document: Document,
    pub events: EventRegistry,
}

impl Page {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            events: EventRegistry::new(),
        }
    }

    pub fn shared(self) -> SharedPage {
        Arc::new(Mutex::new(self))
    }

    /// Free a subtree and forget any registrations recorded for it.
    pub fn discard(&mut self, node: NodeId) {
        let freed = self.document.discard(node);
        self.events.forget(freed);
    }
}
