//! Document Model
//!
//! An arena-backed HTML document. Node identity is the arena key (`NodeId`), so "the same
//! element" across a reconciliation means "the same key". Nodes removed from the tree stay
//! allocated until they are discarded, which lets detached subtrees (fresh server content)
//! live in the same arena as the connected document.

pub mod parse;
pub mod selector;
pub mod serialize;

pub use selector::FrameSelector;

use crate::events::{Handler, ListenerEntry, ListenerId, ListenerOptions};
use slotmap::{SecondaryMap, SlotMap};
use std::fmt;
use tracing::{debug, trace, warn};

slotmap::new_key_type! {
    /// Stable identity of a node in a [`Document`].
    pub struct NodeId;
}

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is raw text up to the matching end tag.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// A single `name="value"` pair. Names are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Execution state of a `<script>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    /// Produced by the parser; never executes.
    Inert,
    /// Created by the runtime; starts once it becomes connected.
    Armed,
    /// Already ran (or was refused by the nonce policy).
    Started,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub script: ScriptState,
}

impl ElementData {
    fn new(tag: &str, script: ScriptState) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            script,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Record of a script that started after being connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRun {
    pub node: NodeId,
    pub source: String,
    /// False when the page nonce policy refused execution.
    pub executed: bool,
}

pub const DEFAULT_NONCE_META: &str = "csp-nonce";

/// The live document plus any detached subtrees allocated in its arena.
pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    listeners: SecondaryMap<NodeId, Vec<ListenerEntry>>,
    next_listener: u64,
    mutations: u64,
    scripts: Vec<ScriptRun>,
    nonce_meta: String,
    location: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("mutations", &self.mutations)
            .field("location", &self.location)
            .finish()
    }
}

impl Document {
    /// Create `<html><head></head><body></body></html>`.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let html = nodes.insert(Node::new(NodeKind::Element(ElementData::new(
            "html",
            ScriptState::Started,
        ))));
        let head = nodes.insert(Node::new(NodeKind::Element(ElementData::new(
            "head",
            ScriptState::Started,
        ))));
        let body = nodes.insert(Node::new(NodeKind::Element(ElementData::new(
            "body",
            ScriptState::Started,
        ))));
        nodes[head].parent = Some(html);
        nodes[body].parent = Some(html);
        nodes[html].children = vec![head, body];

        Self {
            nodes,
            html,
            head,
            body,
            listeners: SecondaryMap::new(),
            next_listener: 1,
            mutations: 0,
            scripts: Vec::new(),
            nonce_meta: DEFAULT_NONCE_META.to_string(),
            location: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.html
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Override the `<meta name>` that carries the page CSP nonce.
    pub fn set_nonce_meta_name(&mut self, name: impl Into<String>) {
        self.nonce_meta = name.into();
    }

    // ---- node creation ----

    /// Create a detached element. Scripts created this way are armed.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.insert(Node::new(NodeKind::Element(ElementData::new(
            tag,
            ScriptState::Armed,
        ))))
    }

    pub(crate) fn create_element_with_state(&mut self, tag: &str, script: ScriptState) -> NodeId {
        self.nodes
            .insert(Node::new(NodeKind::Element(ElementData::new(tag, script))))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes.insert(Node::new(NodeKind::Text(text.into())))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes.insert(Node::new(NodeKind::Comment(text.into())))
    }

    // ---- read access ----

    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(data)) => Some(data),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Character data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(t)) | Some(NodeKind::Comment(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text(t)) = self.kind(id) {
            out.push_str(t);
            return out;
        }
        for node in self.descendants(id) {
            if let Some(NodeKind::Text(t)) = self.kind(node) {
                out.push_str(t);
            }
        }
        out
    }

    pub fn script_state(&self, id: NodeId) -> Option<ScriptState> {
        self.element(id).map(|e| e.script)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&c| c == id)?;
        siblings.get(index + 1).copied()
    }

    /// Inclusive: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.exists(id) && self.contains(self.html, id)
    }

    /// Pre-order descendants, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    fn inclusive_descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        std::iter::once(id).chain(self.descendants(id))
    }

    /// First element (inclusive of `root`) whose `id` attribute equals `id_value`.
    pub fn find_by_id_within(&self, root: NodeId, id_value: &str) -> Option<NodeId> {
        self.inclusive_descendants(root)
            .find(|&node| self.get_attribute(node, "id") == Some(id_value))
    }

    /// Look up a connected element by its `id` attribute.
    pub fn get_element_by_id(&self, id_value: &str) -> Option<NodeId> {
        self.find_by_id_within(self.html, id_value)
    }

    /// Elements with the given tag inside `root` (inclusive), in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.inclusive_descendants(root)
            .filter(|&node| self.tag_name(node) == Some(tag))
            .collect()
    }

    /// Nearest inclusive ancestor that is an element with the given tag.
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.tag_name(current) == Some(tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id)
            .map(|e| e.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    // ---- mutation ----

    fn record_mutation(&mut self, node: NodeId) {
        if self.is_connected(node) {
            self.mutations += 1;
        }
    }

    /// Number of mutations applied to connected nodes since the last reset.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    pub fn reset_mutation_count(&mut self) {
        self.mutations = 0;
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.element_mut(id) else {
            return;
        };
        match element.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => element.attributes.push(Attribute {
                name,
                value: value.to_string(),
            }),
        }
        self.record_mutation(id);
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let Some(element) = self.element_mut(id) else {
            return false;
        };
        let before = element.attributes.len();
        element.attributes.retain(|a| a.name != name);
        let removed = element.attributes.len() != before;
        if removed {
            self.record_mutation(id);
        }
        removed
    }

    /// Replace the character data of a text or comment node.
    pub fn set_text(&mut self, id: NodeId, value: &str) {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Text(t)) | Some(NodeKind::Comment(t)) => {
                *t = value.to_string();
            }
            _ => return,
        }
        self.record_mutation(id);
    }

    /// Append without any bookkeeping. Only for freshly built, detached trees.
    pub(crate) fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn unlink(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes.get_mut(child).and_then(|n| n.parent.take()) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|&c| c != child);
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference` (append when `None` or when the
    /// reference is not a child of `parent`). Moves `child` if it is already attached.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.exists(parent) || !self.exists(child) || !self.is_element(parent) {
            return;
        }
        if self.contains(child, parent) {
            warn!(?parent, ?child, "Refusing to insert a node into its own subtree");
            return;
        }
        if reference == Some(child) {
            return;
        }
        if self.parent(child).is_some() {
            self.remove(child);
        }

        let index = reference
            .and_then(|r| self.children(parent).iter().position(|&c| c == r))
            .unwrap_or_else(|| self.children(parent).len());
        self.nodes[parent].children.insert(index, child);
        self.nodes[child].parent = Some(parent);

        if self.is_connected(parent) {
            self.mutations += 1;
            self.start_scripts(child);
        }
    }

    /// Put `new_child` where `old_child` is and detach `old_child`.
    pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) {
        if new_child == old_child || self.parent(old_child) != Some(parent) {
            return;
        }
        self.insert_before(parent, new_child, Some(old_child));
        self.remove(old_child);
    }

    /// Detach a node from its parent. The subtree stays allocated.
    pub fn remove(&mut self, node: NodeId) {
        if self.parent(node).is_none() {
            return;
        }
        let was_connected = self.is_connected(node);
        self.unlink(node);
        if was_connected {
            self.mutations += 1;
        }
    }

    /// Detach and free a subtree together with its native listeners.
    /// Returns the freed node ids.
    pub fn discard(&mut self, node: NodeId) -> Vec<NodeId> {
        if node == self.html || node == self.head || node == self.body || !self.exists(node) {
            return Vec::new();
        }
        self.remove(node);
        let freed: Vec<NodeId> = self.inclusive_descendants(node).collect();
        for &id in &freed {
            self.nodes.remove(id);
            self.listeners.remove(id);
        }
        trace!(?node, freed = freed.len(), "Discarded subtree");
        freed
    }

    /// Copy of an element's identity (tag and attributes) without children.
    /// Text and comment nodes are copied as-is.
    pub fn shallow_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let kind = match self.kind(id)? {
            NodeKind::Element(data) => NodeKind::Element(ElementData {
                tag: data.tag.clone(),
                attributes: data.attributes.clone(),
                script: ScriptState::Armed,
            }),
            other => other.clone(),
        };
        Some(self.nodes.insert(Node::new(kind)))
    }

    /// Deep-copy a subtree of `other` into this arena as a detached tree.
    /// Imported scripts are inert regardless of their state in `other`.
    pub fn import(&mut self, other: &Document, node: NodeId) -> Option<NodeId> {
        let kind = match other.kind(node)? {
            NodeKind::Element(data) => NodeKind::Element(ElementData {
                script: ScriptState::Inert,
                ..data.clone()
            }),
            other => other.clone(),
        };
        let copy = self.nodes.insert(Node::new(kind));
        for &child in other.children(node) {
            if let Some(child_copy) = self.import(other, child) {
                self.push_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    // ---- scripts ----

    /// The page nonce from `<meta name="csp-nonce" content="...">`.
    pub fn csp_nonce(&self) -> Option<String> {
        self.elements_by_tag(self.html, "meta")
            .into_iter()
            .find(|&meta| self.get_attribute(meta, "name") == Some(self.nonce_meta.as_str()))
            .and_then(|meta| self.get_attribute(meta, "content"))
            .map(str::to_string)
    }

    fn start_scripts(&mut self, root: NodeId) {
        let armed: Vec<NodeId> = self
            .elements_by_tag(root, "script")
            .into_iter()
            .filter(|&s| self.script_state(s) == Some(ScriptState::Armed))
            .collect();
        if armed.is_empty() {
            return;
        }
        let page_nonce = self.csp_nonce();
        for script in armed {
            if let Some(element) = self.element_mut(script) {
                element.script = ScriptState::Started;
            }
            let executed = match &page_nonce {
                Some(nonce) => self.get_attribute(script, "nonce") == Some(nonce.as_str()),
                None => true,
            };
            if !executed {
                warn!(?script, "Script refused by page nonce policy");
            } else {
                debug!(?script, "Script executed");
            }
            let source = self.text_content(script);
            self.scripts.push(ScriptRun {
                node: script,
                source,
                executed,
            });
        }
    }

    /// Scripts that started since the document was created.
    pub fn script_runs(&self) -> &[ScriptRun] {
        &self.scripts
    }

    // ---- navigation ----

    /// Record a full-page navigation request.
    pub fn navigate(&mut self, url: &str) {
        debug!(url, "Full navigation requested");
        self.location = Some(url.to_string());
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    // ---- native listener storage ----

    pub(crate) fn add_listener(
        &mut self,
        node: NodeId,
        name: &str,
        handler: Handler,
        options: ListenerOptions,
    ) -> Option<ListenerId> {
        if !self.exists(node) {
            return None;
        }
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        let entry = ListenerEntry {
            id,
            name: name.to_string(),
            handler,
            options,
        };
        match self.listeners.get_mut(node) {
            Some(list) => list.push(entry),
            None => {
                self.listeners.insert(node, vec![entry]);
            }
        }
        Some(id)
    }

    pub(crate) fn remove_listener(&mut self, node: NodeId, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(node) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        list.len() != before
    }

    /// Handlers for `name` on `node`, dropping `once` listeners as they are taken.
    pub(crate) fn take_handlers(&mut self, node: NodeId, name: &str) -> Vec<Handler> {
        let Some(list) = self.listeners.get_mut(node) else {
            return Vec::new();
        };
        let handlers = list
            .iter()
            .filter(|l| l.name == name)
            .map(|l| l.handler.clone())
            .collect();
        list.retain(|l| !(l.name == name && l.options.once));
        handlers
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.get(node).map(Vec::len).unwrap_or(0)
    }
}
