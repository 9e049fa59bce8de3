//! Integration tests for frame update ordering and cancellation
//!
//! Tests cover:
//! - Identity-preserving refresh of a named frame and of the body frame
//! - Supersession of an in-flight refresh
//! - Cascade cancellation of nested frames
//! - Independent frames running concurrently
//! - Recovery after repeated failures

use super::test_utils::{element, text_of, Reply, StubServer};
use framewire::config::FramewireConfig;
use framewire::coordinator::UpdateOutcome;
use framewire::dom::{Document, FrameSelector};
use framewire::error::FrameError;
use framewire::events::{Event, ListenerOptions, NETWORK_ERROR_EVENT};
use framewire::fetch::FetchOptions;
use framewire::runtime::FrameRuntime;
use std::sync::Arc;
use std::time::Duration;

fn runtime(page: &str, server: Arc<StubServer>) -> FrameRuntime {
    let mut config = FramewireConfig::default();
    config.fetch.base_url = Some("http://app.test".to_string());
    FrameRuntime::new(Document::parse(page).unwrap(), config, server)
}

#[tokio::test]
async fn test_root_frame_text_only_update() {
    let runtime = runtime(
        r#"<div id="root"><div id="x">bye</div></div>"#,
        StubServer::new(),
    );
    let page = runtime.page().clone();
    let x = element(&page, "x");
    page.lock().document.reset_mutation_count();

    let producer_page = page.clone();
    let outcome = runtime
        .update_frame(&"root".parse().unwrap(), move |_, _| async move {
            let nodes = producer_page
                .lock()
                .document
                .parse_fragment(r#"<div id="root"><div id="x">hi</div></div>"#)
                .unwrap();
            Ok(Some(nodes[0]))
        })
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Reconciled(element(&page, "root")));
    let guard = page.lock();
    assert_eq!(guard.document.get_element_by_id("x"), Some(x));
    assert_eq!(guard.document.outer_html(x), r#"<div id="x">hi</div>"#);
    assert_eq!(guard.document.mutation_count(), 1);
}

#[tokio::test]
async fn test_body_frame_update_keeps_identity() {
    let runtime = runtime(r#"<div id="x">bye</div>"#, StubServer::new());
    let page = runtime.page().clone();
    let x = element(&page, "x");

    let producer_page = page.clone();
    runtime
        .update_frame(&FrameSelector::Body, move |_, _| async move {
            let mut guard = producer_page.lock();
            let body = guard.document.create_element("body");
            let nodes = guard.document.parse_fragment(r#"<div id="x">hi</div>"#).unwrap();
            guard.document.append_child(body, nodes[0]);
            Ok(Some(body))
        })
        .await
        .unwrap();

    assert_eq!(element(&page, "x"), x);
    assert_eq!(text_of(&page, "x"), "hi");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_refresh_never_applies() {
    let server = StubServer::new()
        .route(
            "http://app.test/slow",
            Reply::delayed(r#"<body><div id="x">slow</div></body>"#, 500),
        )
        .route(
            "http://app.test/fast",
            Reply::delayed(r#"<body><div id="x">fast</div></body>"#, 10),
        );
    let runtime = runtime(r#"<div id="x">initial</div>"#, server.clone());
    let page = runtime.page().clone();

    let slow = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            runtime
                .refresh_frame(&FrameSelector::id("x"), "/slow", FetchOptions::get())
                .await
        })
    };
    tokio::task::yield_now().await;

    runtime
        .refresh_frame(&FrameSelector::id("x"), "/fast", FetchOptions::get())
        .await
        .unwrap();

    assert!(matches!(slow.await.unwrap(), Err(FrameError::Cancelled)));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(text_of(&page, "x"), "fast");
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_parent_refresh_cancels_child_refresh() {
    let server = StubServer::new()
        .route(
            "http://app.test/inner",
            Reply::delayed(r#"<body><div id="inner">from inner</div></body>"#, 1_000),
        )
        .route(
            "http://app.test/outer",
            Reply::delayed(
                r#"<body><div id="outer"><div id="inner">from outer</div></div></body>"#,
                10,
            ),
        );
    let runtime = runtime(
        r#"<div id="outer"><div id="inner">old</div></div>"#,
        server,
    );
    let page = runtime.page().clone();

    let inner = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            runtime
                .refresh_frame(&FrameSelector::id("inner"), "/inner", FetchOptions::get())
                .await
        })
    };
    tokio::task::yield_now().await;
    assert!(runtime.coordinator().is_pending(element(&page, "inner")));

    runtime
        .refresh_frame(&FrameSelector::id("outer"), "/outer", FetchOptions::get())
        .await
        .unwrap();

    assert!(!runtime.coordinator().is_pending(element(&page, "inner")));
    assert!(matches!(inner.await.unwrap(), Err(FrameError::Cancelled)));
    assert_eq!(text_of(&page, "inner"), "from outer");
}

#[tokio::test(start_paused = true)]
async fn test_independent_frames_run_concurrently() {
    let server = StubServer::new()
        .route(
            "http://app.test/a",
            Reply::delayed(r#"<body><p id="a">A2</p></body>"#, 100),
        )
        .route(
            "http://app.test/b",
            Reply::delayed(r#"<body><p id="b">B2</p></body>"#, 100),
        );
    let runtime = runtime(r#"<p id="a">A1</p><p id="b">B1</p>"#, server);
    let page = runtime.page().clone();
    let started = tokio::time::Instant::now();

    let (frame_a, frame_b) = (FrameSelector::id("a"), FrameSelector::id("b"));
    let (a, b) = tokio::join!(
        runtime.refresh_frame(&frame_a, "/a", FetchOptions::get()),
        runtime.refresh_frame(&frame_b, "/b", FetchOptions::get()),
    );

    assert!(a.is_ok() && b.is_ok());
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(text_of(&page, "a"), "A2");
    assert_eq!(text_of(&page, "b"), "B2");
}

#[tokio::test]
async fn test_coordinator_usable_after_repeated_failures() {
    let server = StubServer::new()
        .route("http://app.test/down", Reply::Unreachable("refused".to_string()))
        .route(
            "http://app.test/up",
            Reply::ok(r#"<body><div id="x">back</div></body>"#),
        );
    let runtime = runtime(r#"<div id="x">offline</div>"#, server);
    runtime
        .add_event_listener(
            "x",
            NETWORK_ERROR_EVENT,
            Arc::new(|event: &Event| event.prevent_default()),
            ListenerOptions::default(),
        )
        .unwrap();

    for _ in 0..3 {
        let result = runtime
            .refresh_frame(&FrameSelector::id("x"), "/down", FetchOptions::get())
            .await;
        assert!(matches!(result, Err(FrameError::Network { .. })));
    }
    assert_eq!(runtime.page().lock().document.location(), None);

    runtime
        .refresh_frame(&FrameSelector::id("x"), "/up", FetchOptions::get())
        .await
        .unwrap();
    assert_eq!(text_of(runtime.page(), "x"), "back");
    assert_eq!(runtime.coordinator().pending_count(), 0);
}
