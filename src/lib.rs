//! Framewire: independently refreshable HTML frames
//!
//! A page is partitioned into frames (the body, or any element with a stable id). Refreshing a
//! frame requests new HTML from a server and reconciles it into the live document in place,
//! with at most one update in flight per frame and cascading cancellation of nested frames.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod delegation;
pub mod dom;
pub mod error;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod page;
pub mod reconcile;
pub mod runtime;

pub use cancel::CancellationToken;
pub use config::FramewireConfig;
pub use coordinator::{FrameCoordinator, UpdateOutcome};
pub use dom::{Document, FrameSelector, NodeId};
pub use error::FrameError;
pub use runtime::FrameRuntime;
