//! Frame Update Coordinator
//!
//! Runs one logical frame refresh at a time per frame. Starting an update cancels and awaits
//! whatever update is already pending for the same frame, then snapshots the frame's descendant
//! frames, runs the producer, reconciles the produced element into the page and finally cancels
//! and awaits pending work on the snapshotted descendants.
//!
//! The pending table is keyed by node identity and never keeps a frame alive: entries for
//! frames no longer connected to the document are evicted, and their updates cancelled, whenever
//! an update starts.

use crate::cancel::CancellationToken;
use crate::config::MarkupConfig;
use crate::dom::{selector::descendant_frames, FrameSelector, NodeId};
use crate::error::FrameError;
use crate::page::SharedPage;
use crate::reconcile::Reconciler;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Result of a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The produced content was merged; carries the element now occupying the frame position.
    Reconciled(NodeId),
    /// The producer reported that nothing changed.
    Unchanged,
}

/// How a pending update ended, as seen by whoever supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Settled {
    Reconciled,
    Unchanged,
    Cancelled,
    Failed(String),
}

impl Settled {
    fn of(result: &Result<UpdateOutcome, FrameError>) -> Self {
        match result {
            Ok(UpdateOutcome::Reconciled(_)) => Settled::Reconciled,
            Ok(UpdateOutcome::Unchanged) => Settled::Unchanged,
            Err(e) if e.is_cancellation() => Settled::Cancelled,
            Err(e) => Settled::Failed(e.to_string()),
        }
    }
}

#[derive(Clone)]
struct PendingUpdate {
    generation: u64,
    token: CancellationToken,
    done: watch::Receiver<Option<Settled>>,
}

impl PendingUpdate {
    /// Wait until the update settles. `None` when it was dropped without settling.
    async fn wait(mut self) -> Option<Settled> {
        let settled = self.done.wait_for(Option::is_some).await.ok()?.clone();
        settled
    }
}

type PendingTable = Arc<Mutex<HashMap<NodeId, PendingUpdate>>>;

/// Publishes the outcome of the owning update and releases its table slot.
///
/// Dropping the guard without settling (the update future was dropped) still releases the slot
/// and wakes waiters.
struct CompletionGuard {
    pending: PendingTable,
    frame: NodeId,
    generation: u64,
    sender: watch::Sender<Option<Settled>>,
}

impl CompletionGuard {
    fn settle(self, settled: Settled) {
        let _ = self.sender.send(Some(settled));
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if pending
            .get(&self.frame)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            pending.remove(&self.frame);
        }
    }
}

pub struct FrameCoordinator {
    page: SharedPage,
    markup: MarkupConfig,
    pending: PendingTable,
    next_generation: AtomicU64,
}

impl FrameCoordinator {
    pub fn new(page: SharedPage, markup: MarkupConfig) -> Self {
        Self {
            page,
            markup,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn page(&self) -> &SharedPage {
        &self.page
    }

    pub fn markup(&self) -> &MarkupConfig {
        &self.markup
    }

    /// Refresh the frame addressed by `selector` with the element returned by `producer`.
    ///
    /// The producer receives the live frame element and the update's cancellation signal and
    /// yields a detached replacement element, or `None` for "no change". Errors of this update
    /// (including its own cancellation) are returned to this caller only.
    pub async fn update_frame<P, Fut>(
        &self,
        selector: &FrameSelector,
        producer: P,
    ) -> Result<UpdateOutcome, FrameError>
    where
        P: FnOnce(NodeId, CancellationToken) -> Fut,
        Fut: Future<Output = Result<Option<NodeId>, FrameError>>,
    {
        let frame = {
            let page = self.page.lock();
            selector.resolve(&page.document)
        }
        .ok_or_else(|| FrameError::NotFound(selector.to_string()))?;

        self.evict_detached();

        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, done) = watch::channel(None);
        let previous = self.pending.lock().insert(
            frame,
            PendingUpdate {
                generation,
                token: token.clone(),
                done,
            },
        );
        let guard = CompletionGuard {
            pending: self.pending.clone(),
            frame,
            generation,
            sender,
        };
        debug!(frame = %selector, generation, "Frame update started");

        if let Some(previous) = previous {
            debug!(
                frame = %selector,
                superseded = previous.generation,
                "Superseding pending update"
            );
            previous.token.cancel();
            log_superseded(selector, previous.wait().await);
        }

        let result = self.run(selector, frame, &token, producer).await;
        debug!(
            frame = %selector,
            generation,
            outcome = ?Settled::of(&result),
            "Frame update finished"
        );
        guard.settle(Settled::of(&result));
        result
    }

    async fn run<P, Fut>(
        &self,
        selector: &FrameSelector,
        frame: NodeId,
        token: &CancellationToken,
        producer: P,
    ) -> Result<UpdateOutcome, FrameError>
    where
        P: FnOnce(NodeId, CancellationToken) -> Fut,
        Fut: Future<Output = Result<Option<NodeId>, FrameError>>,
    {
        token.check()?;

        let descendants = {
            let page = self.page.lock();
            descendant_frames(&page.document, frame)
        };

        let Some(produced) = producer(frame, token.clone()).await? else {
            return Ok(UpdateOutcome::Unchanged);
        };

        let result = {
            let mut guard = self.page.lock();
            let page = &mut *guard;
            if let Err(e) = token.check() {
                page.discard(produced);
                return Err(e);
            }
            if !page.document.is_connected(frame) {
                page.discard(produced);
                return Err(FrameError::NotFound(selector.to_string()));
            }

            let result = Reconciler::new(page, &self.markup).reconcile(frame, produced);
            if result != frame {
                if let Some(parent) = page.document.parent(frame) {
                    page.document.replace_child(parent, result, frame);
                }
                page.discard(frame);
            } else {
                page.discard(produced);
            }
            result
        };

        self.cancel_and_await(&descendants).await;
        Ok(UpdateOutcome::Reconciled(result))
    }

    /// Cancel the pending update of `frame`, if any, and wait for it to settle.
    pub async fn cancel_pending(&self, frame: NodeId) {
        self.cancel_and_await(&[frame]).await;
    }

    /// Whether an update is currently in flight for `frame`.
    pub fn is_pending(&self, frame: NodeId) -> bool {
        self.pending.lock().contains_key(&frame)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    async fn cancel_and_await(&self, frames: &[NodeId]) {
        let targets: Vec<PendingUpdate> = {
            let pending = self.pending.lock();
            frames
                .iter()
                .filter_map(|frame| pending.get(frame).cloned())
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        trace!(count = targets.len(), "Cancelling descendant updates");
        let waits = targets.into_iter().map(|update| {
            update.token.cancel();
            update.wait()
        });
        for outcome in join_all(waits).await {
            if let Some(Settled::Failed(message)) = outcome {
                warn!(error = %message, "Cancelled descendant update had failed");
            }
        }
    }

    fn evict_detached(&self) {
        let tracked: Vec<NodeId> = self.pending.lock().keys().copied().collect();
        if tracked.is_empty() {
            return;
        }
        let detached: Vec<NodeId> = {
            let page = self.page.lock();
            tracked
                .into_iter()
                .filter(|&node| !page.document.is_connected(node))
                .collect()
        };
        let mut pending = self.pending.lock();
        for node in detached {
            if let Some(entry) = pending.remove(&node) {
                entry.token.cancel();
                trace!(?node, "Evicted pending update for detached frame");
            }
        }
    }
}

fn log_superseded(selector: &FrameSelector, outcome: Option<Settled>) {
    match outcome {
        Some(Settled::Failed(message)) => {
            warn!(frame = %selector, error = %message, "Superseded frame update failed")
        }
        other => trace!(frame = %selector, outcome = ?other, "Superseded frame update settled"),
    }
}
