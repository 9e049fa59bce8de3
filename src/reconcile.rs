//! Reconciler
//!
//! Merges a live element with a freshly produced element that occupies the same tree position
//! and returns the element that should remain. Identity is preserved wherever the node kind and
//! tag agree; incompatible subtrees are replaced outright. Children are merged in a single
//! forward pass with optional keys (`data-key` by default) tracking identity across reordering.
//!
//! The fresh element is consumed: nodes moved into the live tree are adopted, the rest is left
//! detached for the caller to discard.

use crate::config::MarkupConfig;
use crate::dom::{Document, NodeId, NodeKind};
use crate::events::EventRegistry;
use crate::page::Page;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

enum Step {
    /// Same character-data node kind; carries the new value when it differs.
    CharacterData(Option<String>),
    /// Same element tag: merge in place.
    Element,
    /// Incompatible nodes, or a script: the new node wins.
    Replace,
}

pub struct Reconciler<'a> {
    document: &'a mut Document,
    events: &'a mut EventRegistry,
    markup: &'a MarkupConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(page: &'a mut Page, markup: &'a MarkupConfig) -> Self {
        let Page { document, events } = page;
        Self {
            document,
            events,
            markup,
        }
    }

    /// Merge `new` into `current` and return the node that should occupy the position.
    ///
    /// When the result differs from `current` the caller is responsible for swapping it in.
    pub fn reconcile(&mut self, current: NodeId, new: NodeId) -> NodeId {
        let new = self.rearm_scripts(new);
        let result = self.merge(current, new);
        debug!(
            ?current,
            ?result,
            replaced = result != current,
            "Reconciled element"
        );
        result
    }

    /// Parsed scripts are inert; swap each for a runtime-created clone carrying the page nonce.
    fn rearm_scripts(&mut self, root: NodeId) -> NodeId {
        let scripts = self.document.elements_by_tag(root, "script");
        if scripts.is_empty() {
            return root;
        }
        let nonce = self.document.csp_nonce();
        let mut root = root;
        for script in scripts {
            let fresh = self.document.create_element("script");
            for attribute in self.document.attributes(script).to_vec() {
                if attribute.name != "nonce" {
                    self.document
                        .set_attribute(fresh, &attribute.name, &attribute.value);
                }
            }
            if let Some(nonce) = &nonce {
                self.document.set_attribute(fresh, "nonce", nonce);
            }
            for child in self.document.children(script).to_vec() {
                self.document.append_child(fresh, child);
            }
            match self.document.parent(script) {
                Some(parent) => self.document.replace_child(parent, fresh, script),
                None => root = fresh,
            }
            self.discard(script);
        }
        trace!(?root, "Re-armed scripts in fresh content");
        root
    }

    fn merge(&mut self, current: NodeId, new: NodeId) -> NodeId {
        if current == new {
            return current;
        }
        let step = match (self.document.kind(current), self.document.kind(new)) {
            (Some(NodeKind::Text(old)), Some(NodeKind::Text(fresh)))
            | (Some(NodeKind::Comment(old)), Some(NodeKind::Comment(fresh))) => {
                Step::CharacterData((old != fresh).then(|| fresh.clone()))
            }
            (Some(NodeKind::Element(old)), Some(NodeKind::Element(fresh)))
                if old.tag == fresh.tag && old.tag != "script" =>
            {
                Step::Element
            }
            _ => Step::Replace,
        };

        match step {
            Step::CharacterData(Some(value)) => {
                self.document.set_text(current, &value);
                current
            }
            Step::CharacterData(None) => current,
            Step::Replace => new,
            Step::Element => {
                self.events.remove_event_listeners(self.document, current);
                self.sync_attributes(current, new);
                self.merge_children(current, new);
                current
            }
        }
    }

    /// `style` and the touched-state family are owned by the client and never synced.
    fn is_synced_attribute(&self, name: &str) -> bool {
        name != "style" && !name.starts_with(self.markup.touched_prefix.as_str())
    }

    fn sync_attributes(&mut self, current: NodeId, new: NodeId) {
        let wanted = self.document.attributes(new).to_vec();
        let existing = self.document.attributes(current).to_vec();

        for attribute in &wanted {
            if !self.is_synced_attribute(&attribute.name) {
                continue;
            }
            if self.document.get_attribute(current, &attribute.name) != Some(&attribute.value) {
                self.document
                    .set_attribute(current, &attribute.name, &attribute.value);
            }
        }
        for attribute in &existing {
            if self.is_synced_attribute(&attribute.name)
                && !wanted.iter().any(|w| w.name == attribute.name)
            {
                self.document.remove_attribute(current, &attribute.name);
            }
        }
    }

    fn key_of(&self, node: NodeId) -> Option<String> {
        self.document
            .get_attribute(node, &self.markup.key_attribute)
            .map(str::to_string)
    }

    fn merge_children(&mut self, parent: NodeId, new_parent: NodeId) {
        let fresh: Vec<NodeId> = self.document.children(new_parent).to_vec();
        let fresh_keys: HashSet<String> = fresh.iter().filter_map(|&n| self.key_of(n)).collect();

        let mut by_key: HashMap<String, NodeId> = HashMap::new();
        for &child in self.document.children(parent) {
            if let Some(key) = self.key_of(child) {
                if by_key.contains_key(&key) {
                    warn!(key = %key, ?parent, "Duplicate key among children");
                } else {
                    by_key.insert(key, child);
                }
            }
        }

        let mut cursor = self.document.first_child(parent);
        let mut index = 0;
        loop {
            match (cursor, fresh.get(index).copied()) {
                (None, None) => break,
                (Some(current), None) => {
                    cursor = self.document.next_sibling(current);
                    self.consume(&mut by_key, current);
                    self.discard(current);
                }
                (None, Some(new)) => {
                    self.document.append_child(parent, new);
                    index += 1;
                }
                (Some(current), Some(new)) => {
                    let current_key = self.key_of(current);
                    let new_key = self.key_of(new);

                    if current_key == new_key {
                        cursor = self.document.next_sibling(current);
                        self.consume(&mut by_key, current);
                        let result = self.merge(current, new);
                        if result != current {
                            self.document.replace_child(parent, result, current);
                            self.discard(current);
                        }
                        index += 1;
                        continue;
                    }

                    let Some(new_key) = new_key else {
                        // Unkeyed newcomer; the current child is reconsidered next round.
                        self.document.insert_before(parent, new, Some(current));
                        index += 1;
                        continue;
                    };

                    match self.find_keyed(&by_key, current, &new_key) {
                        Some(found) => {
                            self.consume(&mut by_key, found);
                            let result = self.merge(found, new);
                            self.document.insert_before(parent, result, Some(current));
                            if result != found {
                                self.discard(found);
                            }
                        }
                        None => self.document.insert_before(parent, new, Some(current)),
                    }

                    if current_key.is_some_and(|key| !fresh_keys.contains(&key)) {
                        cursor = self.document.next_sibling(current);
                        self.consume(&mut by_key, current);
                        self.discard(current);
                    }
                    index += 1;
                }
            }
        }
    }

    /// Find an unprocessed live element carrying `key`: a direct child from the lookup, or any
    /// element inside the children from `from` onwards.
    fn find_keyed(
        &self,
        by_key: &HashMap<String, NodeId>,
        from: NodeId,
        key: &str,
    ) -> Option<NodeId> {
        if let Some(&node) = by_key.get(key) {
            return Some(node);
        }
        let mut sibling = Some(from);
        while let Some(node) = sibling {
            if self.key_of(node).as_deref() == Some(key) {
                return Some(node);
            }
            if let Some(nested) = self
                .document
                .descendants(node)
                .into_iter()
                .find(|&d| self.key_of(d).as_deref() == Some(key))
            {
                return Some(nested);
            }
            sibling = self.document.next_sibling(node);
        }
        None
    }

    /// Drop `node` from the lookup once it has been processed.
    fn consume(&self, by_key: &mut HashMap<String, NodeId>, node: NodeId) {
        if let Some(key) = self.key_of(node) {
            if by_key.get(&key) == Some(&node) {
                by_key.remove(&key);
            }
        }
    }

    fn discard(&mut self, node: NodeId) {
        let freed = self.document.discard(node);
        self.events.forget(freed);
    }
}

/// Convenience wrapper: reconcile `current` against `new` on `page`.
pub fn reconcile(page: &mut Page, markup: &MarkupConfig, current: NodeId, new: NodeId) -> NodeId {
    Reconciler::new(page, markup).reconcile(current, new)
}
