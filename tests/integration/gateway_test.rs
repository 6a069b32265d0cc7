// tests/integration/gateway_test.rs

//! Command flows through the full dispatch path.

use super::fixtures::{EXAMPLE_URL, HEADLINE, NEXT_URL};
use super::test_helpers::TestContext;
use serde_json::json;

#[tokio::test]
async fn test_ping_round_trip() {
    let ctx = TestContext::new().await;
    let reply = ctx
        .send("client-a", json!({"id": "1", "method": "ping"}))
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["pong"], json!(true));
    assert_eq!(reply["id"], json!("1"));
}

#[tokio::test]
async fn test_navigate_then_extract() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "nav-1",
                "method": "navigate",
                "session_id": session,
                "url": EXAMPLE_URL
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true), "navigate failed: {reply}");
    assert_eq!(reply["url"], json!(EXAMPLE_URL));
    assert_eq!(reply["title"], json!(HEADLINE));
    assert_eq!(reply["redirected"], json!(false));
    assert_eq!(reply["state_diff"]["url_changed"], json!(true));

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "ext-1",
                "method": "extract",
                "session_id": session,
                "selector": "h1",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["data"], json!(HEADLINE));
    assert_eq!(reply["from_cache"], json!(false));
    assert_eq!(reply["elements"][0]["tag"], json!("h1"));
}

#[tokio::test]
async fn test_click_follows_link() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "c",
                "method": "click",
                "session_id": session,
                "selector": "a.more"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true), "click failed: {reply}");
    // The click navigated, which shows up in the state diff.
    assert_eq!(reply["state_diff"]["url_changed"], json!(true));
    assert_eq!(reply["state_diff"]["current_url"], json!(NEXT_URL));
}

#[tokio::test]
async fn test_click_on_hidden_element() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let reply = ctx
        .send(
            "client-a",
            json!({"id": "c", "method": "click", "session_id": session, "selector": "span.ghost"}),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("ELEMENT_NOT_VISIBLE"));

    // force overrides the visibility check.
    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "cf",
                "method": "click",
                "session_id": session,
                "selector": "span.ghost",
                "force": true
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
}

#[tokio::test]
async fn test_fill_reports_values() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "f",
                "method": "fill",
                "session_id": session,
                "selector": "input#q",
                "text": "rust gateway",
                "validate_after": true
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true), "fill failed: {reply}");
    assert_eq!(reply["previous_value"], json!(""));
    assert_eq!(reply["current_value"], json!("rust gateway"));
    assert_eq!(reply["validated"], json!(true));

    // Filling a non-input is rejected as not interactable.
    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "f2",
                "method": "fill",
                "session_id": session,
                "selector": "h1",
                "text": "nope"
            }),
        )
        .await;
    assert_eq!(reply["error_code"], json!("ELEMENT_NOT_INTERACTABLE"));
}

#[tokio::test]
async fn test_extract_missing_element() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "e",
                "method": "extract",
                "session_id": session,
                "selector": "#does-not-exist",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("ELEMENT_NOT_FOUND"));
}

#[tokio::test]
async fn test_wait_for_attached_and_custom_script() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "w",
                "method": "wait",
                "session_id": session,
                "condition": "attached",
                "selector": "h1"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["condition_met"], json!(true));

    // An unmet element condition is reported, not failed.
    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "w2",
                "method": "wait",
                "session_id": session,
                "condition": "visible",
                "selector": "#never-appears",
                "poll_interval_ms": 10,
                "timeout_ms": 80
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["condition_met"], json!(false));
    assert!(reply["waited_ms"].as_u64().unwrap() >= 40);

    ctx.driver.set_eval_result("window.appReady === true", json!(true));
    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "w3",
                "method": "wait",
                "session_id": session,
                "condition": "custom-script",
                "script": "window.appReady === true"
            }),
        )
        .await;
    assert_eq!(reply["condition_met"], json!(true));
}

#[tokio::test]
async fn test_navigation_failure_is_surfaced() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.driver.fail_navigation("https://unreachable.example/");

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "n",
                "method": "navigate",
                "session_id": session,
                "url": "https://unreachable.example/"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("NAVIGATION_FAILED"));
}

#[tokio::test]
async fn test_redirect_is_reported() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.driver
        .install_redirect("https://example.com/old", NEXT_URL);

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "n",
                "method": "navigate",
                "session_id": session,
                "url": "https://example.com/old"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["redirected"], json!(true));
    assert_eq!(reply["url"], json!(NEXT_URL));
}

#[tokio::test]
async fn test_config_set_reloads_log_level() {
    let ctx = TestContext::new().await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "cfg-1",
                "method": "config.set",
                "parameter": "log_level",
                "value": "debug"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(true), "config.set failed: {reply}");
    assert_eq!(reply["parameter"], json!("log_level"));
    assert_eq!(reply["applied"], json!(true));
    // The running configuration reflects the change.
    assert_eq!(ctx.state.config.lock().await.log_level, "debug");

    // Parameters without a live runtime effect are refused.
    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "cfg-2",
                "method": "config.set",
                "parameter": "port",
                "value": "1"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("INVALID_COMMAND"));
}

#[tokio::test]
async fn test_first_command_auto_creates_session() {
    let ctx = TestContext::new().await;
    let reply = ctx
        .send(
            "client-a",
            json!({"id": "n", "method": "navigate", "url": EXAMPLE_URL}),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(ctx.state.sessions.len(), 1);

    // The same client's next bare command reuses that session.
    let reply = ctx
        .send(
            "client-a",
            json!({"id": "e", "method": "extract", "selector": "h1", "kind": "text"}),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["data"], json!(HEADLINE));
    assert_eq!(ctx.state.sessions.len(), 1);
}
