//! Markup parser
//!
//! A lenient HTML tokenizer and tree builder. It handles what server-rendered fragments use in
//! practice: comments, doctype, void and raw-text elements, quoted/unquoted/boolean attributes,
//! and character references. Mismatched end tags are ignored and open elements are closed at
//! end of input. There are no insertion modes and no implied end tags.

use super::{is_raw_text_element, is_void_element, Attribute, Document, NodeId, ScriptState};
use crate::error::ParseError;
use std::borrow::Cow;

impl Document {
    /// Parse a whole page. Missing `html`/`head`/`body` wrappers are synthesized.
    ///
    /// Scripts in the page are treated as having already run.
    pub fn parse(markup: &str) -> Result<Document, ParseError> {
        let mut doc = Document::new();
        let top = parse_nodes(&mut doc, markup, ScriptState::Started)?;
        doc.adopt_page(top);
        doc.reset_mutation_count();
        Ok(doc)
    }

    /// Parse markup into detached nodes of this document. Scripts are inert.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, ParseError> {
        parse_nodes(self, markup, ScriptState::Inert)
    }

    /// Move parsed top-level nodes into the skeleton created by `Document::new`.
    fn adopt_page(&mut self, top: Vec<NodeId>) {
        let significant: Vec<NodeId> = top
            .iter()
            .copied()
            .filter(|&n| !self.is_blank(n))
            .collect();

        let html_children = match significant.as_slice() {
            [single] if self.tag_name(*single) == Some("html") => {
                let children = self.children(*single).to_vec();
                for &child in &children {
                    self.unlink(child);
                }
                for node in top {
                    if node != *single {
                        self.discard(node);
                    }
                }
                self.discard(*single);
                children
            }
            _ => top,
        };

        let (head, body) = (self.head(), self.body());
        for node in html_children {
            let tag = self.tag_name(node).map(str::to_string);
            match tag.as_deref() {
                Some("head") => {
                    for child in self.children(node).to_vec() {
                        self.unlink(child);
                        self.push_child(head, child);
                    }
                    self.discard(node);
                }
                Some("body") => {
                    let attributes = self.attributes(node).to_vec();
                    for attribute in attributes {
                        self.set_attribute(body, &attribute.name, &attribute.value);
                    }
                    for child in self.children(node).to_vec() {
                        self.unlink(child);
                        self.push_child(body, child);
                    }
                    self.discard(node);
                }
                Some("title") | Some("meta") | Some("link") | Some("base")
                    if self.children(body).is_empty() =>
                {
                    self.push_child(head, node);
                }
                _ if self.is_blank(node) && self.children(body).is_empty() => {
                    self.discard(node);
                }
                _ => self.push_child(body, node),
            }
        }
    }

    fn is_blank(&self, node: NodeId) -> bool {
        match self.kind(node) {
            Some(super::NodeKind::Text(t)) => t.trim().is_empty(),
            Some(super::NodeKind::Comment(_)) => true,
            _ => false,
        }
    }
}

struct TreeBuilder<'d> {
    doc: &'d mut Document,
    scripts: ScriptState,
    stack: Vec<NodeId>,
    roots: Vec<NodeId>,
}

impl<'d> TreeBuilder<'d> {
    fn insert(&mut self, node: NodeId) {
        match self.stack.last() {
            Some(&parent) => self.doc.push_child(parent, node),
            None => self.roots.push(node),
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let node = self.doc.create_text(decode_entities(raw).into_owned());
        self.insert(node);
    }

    fn open(&mut self, tag: &str, attributes: Vec<Attribute>) -> NodeId {
        let node = self.doc.create_element_with_state(tag, self.scripts);
        for attribute in attributes {
            self.doc.set_attribute(node, &attribute.name, &attribute.value);
        }
        self.insert(node);
        node
    }

    fn close(&mut self, tag: &str) {
        if let Some(index) = self
            .stack
            .iter()
            .rposition(|&n| self.doc.tag_name(n) == Some(tag))
        {
            self.stack.truncate(index);
        }
    }
}

/// Parse `markup` into detached nodes allocated in `doc`, returning the top-level nodes.
pub(crate) fn parse_nodes(
    doc: &mut Document,
    markup: &str,
    scripts: ScriptState,
) -> Result<Vec<NodeId>, ParseError> {
    let mut builder = TreeBuilder {
        doc,
        scripts,
        stack: Vec::new(),
        roots: Vec::new(),
    };
    let bytes = markup.as_bytes();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        let next = bytes.get(pos + 1).copied();

        if markup[pos..].starts_with("<!--") {
            builder.text(&markup[text_start..pos]);
            let body_start = pos + 4;
            let end = markup[body_start..]
                .find("-->")
                .ok_or(ParseError::UnterminatedComment { offset: pos })?;
            let comment = builder
                .doc
                .create_comment(&markup[body_start..body_start + end]);
            builder.insert(comment);
            pos = body_start + end + 3;
            text_start = pos;
        } else if matches!(next, Some(b'!') | Some(b'?')) {
            builder.text(&markup[text_start..pos]);
            let end = markup[pos..]
                .find('>')
                .ok_or(ParseError::UnterminatedTag { offset: pos })?;
            pos += end + 1;
            text_start = pos;
        } else if next == Some(b'/') && bytes.get(pos + 2).is_some_and(u8::is_ascii_alphabetic) {
            builder.text(&markup[text_start..pos]);
            let end = markup[pos..]
                .find('>')
                .ok_or(ParseError::UnterminatedTag { offset: pos })?;
            let name = markup[pos + 2..pos + end]
                .split(|c: char| c.is_ascii_whitespace())
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            builder.close(&name);
            pos += end + 1;
            text_start = pos;
        } else if next.is_some_and(|b| b.is_ascii_alphabetic()) {
            builder.text(&markup[text_start..pos]);
            let tag = parse_start_tag(markup, pos)?;
            let node = builder.open(&tag.name, tag.attributes);
            pos = tag.end;

            if is_void_element(&tag.name) || tag.self_closing {
                // no children
            } else if is_raw_text_element(&tag.name) {
                let (content_end, resume) = find_raw_text_end(markup, pos, &tag.name);
                let raw = &markup[pos..content_end];
                if !raw.is_empty() {
                    let text = if tag.name == "script" || tag.name == "style" {
                        raw.to_string()
                    } else {
                        decode_entities(raw).into_owned()
                    };
                    let text_node = builder.doc.create_text(text);
                    builder.doc.push_child(node, text_node);
                }
                pos = resume;
            } else {
                builder.stack.push(node);
            }
            text_start = pos;
        } else {
            // A lone '<' is text.
            pos += 1;
        }
    }
    builder.text(&markup[text_start..]);
    Ok(builder.roots)
}

struct StartTag {
    name: String,
    attributes: Vec<Attribute>,
    self_closing: bool,
    /// Byte offset just past the closing '>'.
    end: usize,
}

fn parse_start_tag(markup: &str, start: usize) -> Result<StartTag, ParseError> {
    let bytes = markup.as_bytes();
    let unterminated = ParseError::UnterminatedTag { offset: start };
    let is_name_end = |b: u8| b.is_ascii_whitespace() || b == b'>' || b == b'/';

    let mut pos = start + 1;
    while pos < bytes.len() && !is_name_end(bytes[pos]) {
        pos += 1;
    }
    let name = markup[start + 1..pos].to_ascii_lowercase();
    let mut attributes: Vec<Attribute> = Vec::new();

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return Err(unterminated),
            Some(b'>') => {
                return Ok(StartTag {
                    name,
                    attributes,
                    self_closing: false,
                    end: pos + 1,
                })
            }
            Some(b'/') => {
                if bytes.get(pos + 1) == Some(&b'>') {
                    return Ok(StartTag {
                        name,
                        attributes,
                        self_closing: true,
                        end: pos + 2,
                    });
                }
                pos += 1;
                continue;
            }
            Some(_) => {}
        }

        let name_start = pos;
        while pos < bytes.len() && !is_name_end(bytes[pos]) && bytes[pos] != b'=' {
            pos += 1;
        }
        let attr_name = markup[name_start..pos].to_ascii_lowercase();
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut value = String::new();
        if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match bytes.get(pos) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = pos + 1;
                    let len = markup[value_start..]
                        .find(quote as char)
                        .ok_or(unterminated.clone())?;
                    value = decode_entities(&markup[value_start..value_start + len]).into_owned();
                    pos = value_start + len + 1;
                }
                Some(_) => {
                    let value_start = pos;
                    while pos < bytes.len()
                        && !bytes[pos].is_ascii_whitespace()
                        && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    value = decode_entities(&markup[value_start..pos]).into_owned();
                }
                None => return Err(unterminated),
            }
        }

        if !attr_name.is_empty() && !attributes.iter().any(|a| a.name == attr_name) {
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }
    }
}

/// Locate `</tag` (case-insensitive) at or after `from`.
/// Returns (end of raw content, offset to resume parsing).
fn find_raw_text_end(markup: &str, from: usize, tag: &str) -> (usize, usize) {
    let lower = markup[from..].to_ascii_lowercase();
    let needle = format!("</{}", tag);
    match lower.find(&needle) {
        Some(rel) => {
            let content_end = from + rel;
            let resume = markup[content_end..]
                .find('>')
                .map(|gt| content_end + gt + 1)
                .unwrap_or(markup.len());
            (content_end, resume)
        }
        None => (markup.len(), markup.len()),
    }
}

/// Decode named (`&amp;` `&lt;` `&gt;` `&quot;` `&apos;` `&nbsp;`) and numeric references.
/// Unknown references are kept verbatim.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let hex = number
                .strip_prefix('x')
                .or_else(|| number.strip_prefix('X'));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
