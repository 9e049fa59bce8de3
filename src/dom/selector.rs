//! Frame addressing
//!
//! One scheme for every frame: the document body is the implicit root frame, every other frame
//! is an element with a document-unique `id`.

use super::{Document, NodeId};
use crate::error::FrameError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameSelector {
    /// The document body, the root frame.
    Body,
    /// The element whose `id` attribute matches.
    Id(String),
}

impl FrameSelector {
    pub fn id(id: impl Into<String>) -> Self {
        FrameSelector::Id(id.into())
    }

    /// Find the live frame element.
    pub fn resolve(&self, doc: &Document) -> Option<NodeId> {
        match self {
            FrameSelector::Body => Some(doc.body()),
            FrameSelector::Id(id) => doc.get_element_by_id(id),
        }
    }

    /// Find the matching element inside a parsed payload rooted at `payload_body`.
    pub fn locate_in(&self, doc: &Document, payload_body: NodeId) -> Option<NodeId> {
        match self {
            FrameSelector::Body => Some(payload_body),
            FrameSelector::Id(id) => doc.find_by_id_within(payload_body, id),
        }
    }

    /// The selector that addresses `node`, if it is a frame element.
    pub fn for_element(doc: &Document, node: NodeId) -> Option<Self> {
        if node == doc.body() {
            return Some(FrameSelector::Body);
        }
        doc.get_attribute(node, "id")
            .filter(|id| !id.is_empty())
            .map(FrameSelector::id)
    }

    /// The value sent to the server to name the originating frame.
    pub fn header_value(&self) -> Option<&str> {
        match self {
            FrameSelector::Body => None,
            FrameSelector::Id(id) => Some(id),
        }
    }
}

impl FromStr for FrameSelector {
    type Err = FrameError;

    /// `body` addresses the root frame; `#id` or a bare `id` addresses an element.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("body") {
            return Ok(FrameSelector::Body);
        }
        let id = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(FrameError::NotFound(format!(
                "Invalid frame selector: {:?}",
                s
            )));
        }
        Ok(FrameSelector::id(id))
    }
}

impl fmt::Display for FrameSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSelector::Body => write!(f, "body"),
            FrameSelector::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// Whether `node` is a frame element: the body or an element with a non-empty id.
pub fn is_frame(doc: &Document, node: NodeId) -> bool {
    FrameSelector::for_element(doc, node).is_some()
}

/// Every frame element strictly inside `frame`, in document order.
pub fn descendant_frames(doc: &Document, frame: NodeId) -> Vec<NodeId> {
    doc.descendants(frame)
        .into_iter()
        .filter(|&node| is_frame(doc, node))
        .collect()
}
