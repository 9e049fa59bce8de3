//! Integration tests for the reconciler on whole pages

use framewire::config::MarkupConfig;
use framewire::dom::{Document, NodeId};
use framewire::events::{Event, ListenerOptions};
use framewire::page::Page;
use framewire::reconcile::reconcile;
use std::sync::Arc;

fn page_with_fragment(live: &str, fresh: &str) -> (Page, NodeId, NodeId) {
    let mut page = Page::new(Document::parse(live).unwrap());
    let current = page.document.get_element_by_id("f").unwrap();
    let new = page.document.parse_fragment(fresh).unwrap()[0];
    page.document.reset_mutation_count();
    (page, current, new)
}

fn merge(page: &mut Page, current: NodeId, new: NodeId) -> NodeId {
    reconcile(page, &MarkupConfig::default(), current, new)
}

#[test]
fn test_identical_content_causes_no_mutation() {
    let markup =
        r#"<section id="f" class="card"><h2>Title</h2><ul><li data-key="1">one</li><li data-key="2">two</li></ul><!-- note --></section>"#;
    let (mut page, current, new) = page_with_fragment(markup, markup);
    let before = page.document.outer_html(current);

    let result = merge(&mut page, current, new);

    assert_eq!(result, current);
    assert_eq!(page.document.mutation_count(), 0);
    assert_eq!(page.document.outer_html(current), before);
}

#[test]
fn test_keyed_children_reorder_preserving_identity() {
    let (mut page, current, new) = page_with_fragment(
        r#"<ul id="f"><li data-key="1">A</li><li data-key="2">B</li></ul>"#,
        r#"<ul id="f"><li data-key="2">B</li><li data-key="1">A</li></ul>"#,
    );
    let before = page.document.children(current).to_vec();

    merge(&mut page, current, new);

    assert_eq!(page.document.children(current), &[before[1], before[0]]);
}

#[test]
fn test_keyed_child_relocated_from_nested_position() {
    let (mut page, current, new) = page_with_fragment(
        r#"<ul id="f"><li data-key="a">A</li><div><li data-key="b">B</li></div></ul>"#,
        r#"<ul id="f"><li data-key="b">B2</li><li data-key="a">A</li></ul>"#,
    );
    let a = page.document.children(current)[0];
    let wrapper = page.document.children(current)[1];
    let b = page.document.children(wrapper)[0];

    merge(&mut page, current, new);

    assert_eq!(page.document.children(current), &[b, a]);
    assert_eq!(page.document.text_content(b), "B2");
    assert!(!page.document.exists(wrapper));
}

#[test]
fn test_mismatched_tag_replaces_without_carryover() {
    let (mut page, current, new) = page_with_fragment(
        r#"<div id="f"><div class="old" title="t">x<b>bold</b></div></div>"#,
        r#"<div id="f"><span>y</span></div>"#,
    );
    let old_child = page.document.children(current)[0];
    let new_child = page.document.children(new)[0];

    merge(&mut page, current, new);

    let child = page.document.children(current)[0];
    assert_eq!(child, new_child);
    assert!(!page.document.exists(old_child));
    assert!(page.document.attributes(child).is_empty());
    assert_eq!(page.document.outer_html(child), "<span>y</span>");
}

#[test]
fn test_scripts_always_replaced_and_rerun_with_page_nonce() {
    let (mut page, current, new) = page_with_fragment(
        r#"<html><head><meta name="csp-nonce" content="n0nce"></head><body><div id="f"><script>init()</script></div></body></html>"#,
        r#"<div id="f"><script nonce="forged">init()</script></div>"#,
    );
    let old_script = page.document.children(current)[0];
    let runs_before = page.document.script_runs().len();

    merge(&mut page, current, new);

    let script = page.document.children(current)[0];
    assert_ne!(script, old_script);
    assert_eq!(page.document.get_attribute(script, "nonce"), Some("n0nce"));
    let runs = page.document.script_runs();
    assert_eq!(runs.len(), runs_before + 1);
    let last = runs.last().unwrap();
    assert_eq!(last.node, script);
    assert_eq!(last.source, "init()");
    assert!(last.executed);
}

#[test]
fn test_client_owned_attributes_survive() {
    let (mut page, current, new) = page_with_fragment(
        r#"<input id="f" style="color: red" data-touched="true" data-touched-at="3" value="a" disabled>"#,
        r#"<input id="f" value="b" style="color: blue">"#,
    );

    merge(&mut page, current, new);

    let doc = &page.document;
    assert_eq!(doc.get_attribute(current, "style"), Some("color: red"));
    assert_eq!(doc.get_attribute(current, "data-touched"), Some("true"));
    assert_eq!(doc.get_attribute(current, "data-touched-at"), Some("3"));
    assert_eq!(doc.get_attribute(current, "value"), Some("b"));
    assert!(!doc.has_attribute(current, "disabled"));
}

#[test]
fn test_repeated_reconcile_does_not_accumulate_listeners() {
    let mut page = Page::new(Document::parse(r#"<button id="f">Buy</button>"#).unwrap());
    let button = page.document.get_element_by_id("f").unwrap();

    for round in 0..3 {
        let Page { document, events } = &mut page;
        events
            .add_event_listener(
                document,
                "f",
                "click",
                Arc::new(|_: &Event| {}),
                ListenerOptions::default(),
            )
            .unwrap();
        assert_eq!(page.document.listener_count(button), 1, "round {}", round);

        let fresh = page
            .document
            .parse_fragment(r#"<button id="f">Buy</button>"#)
            .unwrap()[0];
        let result = merge(&mut page, button, fresh);
        assert_eq!(result, button);
        assert_eq!(page.document.listener_count(button), 0);
        assert_eq!(page.events.registered(button), 0);
        page.document.discard(fresh);
    }
}
