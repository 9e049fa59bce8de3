//! Integration tests for document-level link and form delegation

use super::test_utils::{element, text_of, Reply, StubServer};
use framewire::config::FramewireConfig;
use framewire::dom::Document;
use framewire::fetch::Method;
use framewire::runtime::FrameRuntime;
use std::sync::Arc;
use std::time::Duration;

fn runtime(page: &str, server: Arc<StubServer>) -> FrameRuntime {
    let mut config = FramewireConfig::default();
    config.fetch.base_url = Some("http://app.test".to_string());
    FrameRuntime::new(Document::parse(page).unwrap(), config, server)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_install_delegation_is_idempotent() {
    let runtime = runtime("<p></p>", StubServer::new());
    assert!(runtime.install_delegation().unwrap());
    assert!(!runtime.install_delegation().unwrap());

    let guard = runtime.page().lock();
    assert_eq!(guard.document.listener_count(guard.document.root()), 2);
}

#[test]
fn test_install_delegation_requires_async_runtime() {
    let runtime = runtime("<p></p>", StubServer::new());
    assert!(runtime.install_delegation().is_err());
}

#[tokio::test]
async fn test_link_click_refreshes_target_frame() {
    let server = StubServer::new().route(
        "http://app.test/list?page=2",
        Reply::ok(r#"<body><ol id="list"><li>page two</li></ol></body>"#),
    );
    let runtime = runtime(
        r#"<ol id="list"><li>page one</li></ol><a id="next" href="/list?page=2" data-frame="list"><em id="label">Next</em></a>"#,
        server.clone(),
    );
    runtime.install_delegation().unwrap();
    let page = runtime.page().clone();

    let label = element(&page, "label");
    assert!(!runtime.click(label), "delegation should prevent the default navigation");

    eventually(|| text_of(&page, "list") == "page two").await;
    let requests = server.requests();
    assert_eq!(requests[0].header("X-Frame-Id"), Some("list"));
}

#[tokio::test]
async fn test_plain_link_is_left_alone() {
    let runtime = runtime(r#"<a id="out" href="/elsewhere">Away</a>"#, StubServer::new());
    runtime.install_delegation().unwrap();
    let out = element(runtime.page(), "out");
    assert!(runtime.click(out));
}

#[tokio::test]
async fn test_form_submit_posts_fields() {
    let server = StubServer::new().route(
        "http://app.test/cart",
        Reply::ok(r#"<body><div id="cart">2 items</div></body>"#),
    );
    let runtime = runtime(
        r#"<div id="cart">1 item</div>
           <form id="add" method="post" action="/cart" data-frame="cart">
             <input type="hidden" name="sku" value="42">
             <input name="qty" value="1">
           </form>"#,
        server.clone(),
    );
    runtime.install_delegation().unwrap();
    let page = runtime.page().clone();

    assert!(!runtime.submit(element(&page, "add")));

    eventually(|| text_of(&page, "cart") == "2 items").await;
    let request = &server.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.body.as_deref(), Some("sku=42&qty=1"));
}
