//! Property-based tests for reconciliation

use framewire::config::MarkupConfig;
use framewire::dom::{Document, NodeId};
use framewire::page::Page;
use framewire::reconcile::reconcile;
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Tree {
    Text(String),
    Element {
        tag: &'static str,
        class: Option<String>,
        children: Vec<Tree>,
    },
}

fn render(tree: &Tree, out: &mut String) {
    match tree {
        Tree::Text(text) => out.push_str(text),
        Tree::Element {
            tag,
            class,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            if let Some(class) = class {
                out.push_str(&format!(" class=\"{}\"", class));
            }
            out.push('>');
            for child in children {
                render(child, out);
            }
            out.push_str(&format!("</{}>", tag));
        }
    }
}

fn tree_strategy() -> impl Strategy<Value = Tree> {
    let leaf = "[a-z]{1,6}( [a-z]{1,6})?".prop_map(Tree::Text);
    leaf.prop_recursive(3, 32, 4, |inner| {
        (
            prop::sample::select(vec!["div", "span", "p", "ul", "li", "em", "section"]),
            prop::option::of("[a-z]{1,5}"),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, class, children)| Tree::Element {
                tag,
                class,
                children,
            })
    })
}

fn frame_markup(children: &[Tree]) -> String {
    let mut out = String::from(r#"<div id="f">"#);
    for child in children {
        render(child, &mut out);
    }
    out.push_str("</div>");
    out
}

fn keyed_list(keys: &[u32]) -> String {
    let items: String = keys
        .iter()
        .map(|k| format!(r#"<li data-key="{}">item {}</li>"#, k, k))
        .collect();
    format!(r#"<ul id="f">{}</ul>"#, items)
}

fn keys_by_node(doc: &Document, list: NodeId) -> HashMap<String, NodeId> {
    doc.children(list)
        .iter()
        .map(|&li| (doc.get_attribute(li, "data-key").unwrap().to_string(), li))
        .collect()
}

/// Reconciling against structurally identical content never mutates the live tree
#[test]
fn test_reconcile_identical_is_noop_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(tree_strategy(), 0..5), |children| {
            let markup = frame_markup(&children);
            let mut page = Page::new(Document::parse(&markup).unwrap());
            let current = page.document.get_element_by_id("f").unwrap();
            let before = page.document.outer_html(current);
            let new = page.document.parse_fragment(&markup).unwrap()[0];
            page.document.reset_mutation_count();

            let result = reconcile(&mut page, &MarkupConfig::default(), current, new);

            prop_assert_eq!(result, current);
            prop_assert_eq!(page.document.mutation_count(), 0);
            prop_assert_eq!(page.document.outer_html(current), before);
            Ok(())
        })
        .unwrap();
}

/// Permuting keyed children only moves the existing elements
#[test]
fn test_keyed_permutation_preserves_identity_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let strategy = (1u32..9).prop_flat_map(|n| {
        let keys: Vec<u32> = (0..n).collect();
        (Just(keys.clone()), Just(keys).prop_shuffle())
    });

    runner
        .run(&strategy, |(original, permuted)| {
            let mut page = Page::new(Document::parse(&keyed_list(&original)).unwrap());
            let list = page.document.get_element_by_id("f").unwrap();
            let before = keys_by_node(&page.document, list);
            let new = page.document.parse_fragment(&keyed_list(&permuted)).unwrap()[0];

            reconcile(&mut page, &MarkupConfig::default(), list, new);

            let expected: Vec<NodeId> = permuted.iter().map(|k| before[&k.to_string()]).collect();
            prop_assert_eq!(page.document.children(list), expected.as_slice());
            Ok(())
        })
        .unwrap();
}

/// Surviving keys keep their elements when the list also gains and loses members
#[test]
fn test_keyed_insert_remove_preserves_survivors_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let strategy = (
        prop::collection::btree_set(0u32..20, 1..8),
        prop::collection::btree_set(100u32..110, 0..4),
    )
        .prop_flat_map(|(old, added)| {
            let old: Vec<u32> = old.into_iter().collect();
            let added: Vec<u32> = added.into_iter().collect();
            let kept = prop::sample::subsequence(old.clone(), 0..=old.len());
            (Just(old), kept, Just(added))
        })
        .prop_flat_map(|(old, kept, added)| {
            let mut fresh = kept;
            fresh.extend(added);
            (Just(old), Just(fresh).prop_shuffle())
        });

    runner
        .run(&strategy, |(old, fresh)| {
            let mut page = Page::new(Document::parse(&keyed_list(&old)).unwrap());
            let list = page.document.get_element_by_id("f").unwrap();
            let before = keys_by_node(&page.document, list);
            let new = page.document.parse_fragment(&keyed_list(&fresh)).unwrap()[0];

            reconcile(&mut page, &MarkupConfig::default(), list, new);

            let after = page.document.children(list).to_vec();
            let keys: Vec<String> = after
                .iter()
                .map(|&li| page.document.get_attribute(li, "data-key").unwrap().to_string())
                .collect();
            let wanted: Vec<String> = fresh.iter().map(u32::to_string).collect();
            prop_assert_eq!(&keys, &wanted);
            for (key, node) in keys.iter().zip(&after) {
                if let Some(&old_node) = before.get(key) {
                    prop_assert_eq!(*node, old_node);
                }
            }
            for (key, node) in &before {
                if !wanted.contains(key) {
                    prop_assert!(!page.document.exists(*node));
                }
            }
            Ok(())
        })
        .unwrap();
}
