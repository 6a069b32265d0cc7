// tests/integration/cache_behavior_test.rs

//! Read-through caching and state-driven invalidation, observed end to end.

use super::fixtures::EXAMPLE_URL;
use super::test_helpers::TestContext;
use serde_json::json;

#[tokio::test]
async fn test_repeated_extract_served_from_cache() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let first = ctx
        .send(
            "client-a",
            json!({
                "id": "e1",
                "method": "extract",
                "session_id": session,
                "selector": "p.lead",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(first["success"], json!(true));
    assert_eq!(first["from_cache"], json!(false));
    let reads_after_first = ctx.driver.read_count();

    let second = ctx
        .send(
            "client-a",
            json!({
                "id": "e2",
                "method": "extract",
                "session_id": session,
                "selector": "p.lead",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(second["success"], json!(true));
    assert_eq!(second["from_cache"], json!(true));
    assert_eq!(second["data"], first["data"]);
    // No additional executor call reached the backend.
    assert_eq!(ctx.driver.read_count(), reads_after_first);
}

#[tokio::test]
async fn test_mutating_click_invalidates_cache() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    let before = ctx
        .send(
            "client-a",
            json!({
                "id": "e1",
                "method": "extract",
                "session_id": session,
                "selector": "p.lead",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(before["from_cache"], json!(false));

    // The button rewrites the paragraph in place.
    let click = ctx
        .send(
            "client-a",
            json!({
                "id": "c",
                "method": "click",
                "session_id": session,
                "selector": "button#rewrite"
            }),
        )
        .await;
    assert_eq!(click["success"], json!(true));
    assert_eq!(click["state_diff"]["dom_changed"], json!(true));

    // The next extract misses the cache and observes the mutation.
    let after = ctx
        .send(
            "client-a",
            json!({
                "id": "e2",
                "method": "extract",
                "session_id": session,
                "selector": "p.lead",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(after["from_cache"], json!(false));
    assert_eq!(after["data"], json!("rewritten"));
}

#[tokio::test]
async fn test_cache_is_scoped_per_session() {
    let ctx = TestContext::new().await;
    let session_a = ctx.create_session("client-a").await;
    let session_b = ctx.create_session("client-b").await;

    for (client, session) in [("client-a", &session_a), ("client-b", &session_b)] {
        ctx.send(
            client,
            json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
        )
        .await;
    }

    let a1 = ctx
        .send(
            "client-a",
            json!({
                "id": "a1",
                "method": "extract",
                "session_id": session_a,
                "selector": "h1",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(a1["from_cache"], json!(false));

    // Same fingerprint inputs, different session: not a shared entry.
    let b1 = ctx
        .send(
            "client-b",
            json!({
                "id": "b1",
                "method": "extract",
                "session_id": session_b,
                "selector": "h1",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(b1["from_cache"], json!(false));

    // A mutation in session B leaves session A's cache intact.
    ctx.send(
        "client-b",
        json!({
            "id": "c",
            "method": "click",
            "session_id": session_b,
            "selector": "button#rewrite"
        }),
    )
    .await;

    let a2 = ctx
        .send(
            "client-a",
            json!({
                "id": "a2",
                "method": "extract",
                "session_id": session_a,
                "selector": "h1",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(a2["from_cache"], json!(true));
}

#[tokio::test]
async fn test_wait_results_are_never_cached() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;
    ctx.send(
        "client-a",
        json!({"id": "n", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
    )
    .await;

    for id in ["w1", "w2"] {
        let reply = ctx
            .send(
                "client-a",
                json!({
                    "id": id,
                    "method": "wait",
                    "session_id": session,
                    "condition": "attached",
                    "selector": "h1"
                }),
            )
            .await;
        assert_eq!(reply["success"], json!(true));
        // Wait replies carry no cache marker at all.
        assert!(reply.get("from_cache").is_none());
    }
    assert!(ctx.state.cache.is_empty());
}
