//! Runtime facade
//!
//! Ties one page to a coordinator and a fetcher. Cheap to clone; clones share the page.

use crate::cancel::CancellationToken;
use crate::config::FramewireConfig;
use crate::coordinator::{FrameCoordinator, UpdateOutcome};
use crate::dom::{Document, FrameSelector, NodeId};
use crate::error::FrameError;
use crate::events::{
    dispatch_event, Event, EventDetail, Handler, ListenerId, ListenerOptions, CLICK_EVENT,
    SUBMIT_EVENT,
};
use crate::fetch::{FetchOptions, FrameFetcher, HttpClient, ReqwestClient};
use crate::page::{Page, SharedPage};
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct FrameRuntime {
    coordinator: Arc<FrameCoordinator>,
    fetcher: FrameFetcher,
    config: Arc<FramewireConfig>,
    pub(crate) delegation_installed: Arc<AtomicBool>,
}

impl FrameRuntime {
    pub fn new(
        mut document: Document,
        config: FramewireConfig,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        document.set_nonce_meta_name(config.markup.nonce_meta.clone());
        let page = Page::new(document).shared();
        let coordinator = Arc::new(FrameCoordinator::new(page, config.markup.clone()));
        let fetcher = FrameFetcher::new(client, config.fetch.clone());
        Self {
            coordinator,
            fetcher,
            config: Arc::new(config),
            delegation_installed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Validate `config` and build a runtime over the `reqwest` transport.
    pub fn from_config(document: Document, config: FramewireConfig) -> Result<Self, FrameError> {
        config.ensure_valid()?;
        let client = ReqwestClient::new(&config.fetch)?;
        Ok(Self::new(document, config, Arc::new(client)))
    }

    pub fn page(&self) -> &SharedPage {
        self.coordinator.page()
    }

    pub fn coordinator(&self) -> &Arc<FrameCoordinator> {
        &self.coordinator
    }

    pub fn fetcher(&self) -> &FrameFetcher {
        &self.fetcher
    }

    pub fn config(&self) -> &FramewireConfig {
        &self.config
    }

    pub async fn update_frame<P, Fut>(
        &self,
        selector: &FrameSelector,
        producer: P,
    ) -> Result<UpdateOutcome, FrameError>
    where
        P: FnOnce(NodeId, CancellationToken) -> Fut,
        Fut: Future<Output = Result<Option<NodeId>, FrameError>>,
    {
        self.coordinator.update_frame(selector, producer).await
    }

    /// Refresh a frame from the server.
    pub async fn refresh_frame(
        &self,
        selector: &FrameSelector,
        url: &str,
        options: FetchOptions,
    ) -> Result<UpdateOutcome, FrameError> {
        refresh_with(&self.coordinator, &self.fetcher, selector, url, options).await
    }

    /// Attach a listener to the element with the given `id` through the event registry.
    pub fn add_event_listener(
        &self,
        element_id: &str,
        name: &str,
        handler: Handler,
        options: ListenerOptions,
    ) -> Result<ListenerId, FrameError> {
        let mut guard = self.page().lock();
        let Page { document, events } = &mut *guard;
        events.add_event_listener(document, element_id, name, handler, options)
    }

    pub fn remove_event_listeners(&self, element_id: &str) -> Result<usize, FrameError> {
        let mut guard = self.page().lock();
        let Page { document, events } = &mut *guard;
        let node = document
            .get_element_by_id(element_id)
            .ok_or_else(|| FrameError::NotFound(format!("#{}", element_id)))?;
        Ok(events.remove_event_listeners(document, node))
    }

    /// Dispatch an event; `false` iff a handler prevented the default.
    pub fn dispatch(&self, event: &Event) -> bool {
        dispatch_event(self.page(), event)
    }

    /// Simulate a user click on `node`.
    pub fn click(&self, node: NodeId) -> bool {
        let event = Event::new(CLICK_EVENT, node)
            .bubbling()
            .cancelable()
            .with_detail(EventDetail::Click);
        self.dispatch(&event)
    }

    /// Simulate submitting the form `node`.
    pub fn submit(&self, node: NodeId) -> bool {
        let event = Event::new(SUBMIT_EVENT, node)
            .bubbling()
            .cancelable()
            .with_detail(EventDetail::Submit);
        self.dispatch(&event)
    }
}

pub(crate) async fn refresh_with(
    coordinator: &FrameCoordinator,
    fetcher: &FrameFetcher,
    selector: &FrameSelector,
    url: &str,
    options: FetchOptions,
) -> Result<UpdateOutcome, FrameError> {
    debug!(frame = %selector, url, "Refreshing frame");
    let page = coordinator.page().clone();
    coordinator
        .update_frame(selector, move |frame, signal| async move {
            fetcher
                .load(&page, frame, url, options, &signal)
                .await
                .map(Some)
        })
        .await
}
