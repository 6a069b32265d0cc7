// tests/integration/scenarios_test.rs

//! Boundary scenarios: ownership, admission control, unsafe input, reaping.

use super::fixtures::EXAMPLE_URL;
use super::test_helpers::TestContext;
use browsergate::config::Config;
use browsergate::core::tasks::reaper::SessionReaper;
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;

#[tokio::test]
async fn test_cross_client_access_is_rejected() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-x").await;

    let reply = ctx
        .send(
            "client-y",
            json!({
                "id": "steal",
                "method": "extract",
                "session_id": session,
                "selector": "h1",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("SESSION_NOT_OWNED"));

    // The owner is unaffected.
    let reply = ctx
        .send(
            "client-x",
            json!({"id": "nav", "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
}

#[tokio::test]
async fn test_rate_limit_trip() {
    let mut config = Config::default();
    config.session.hard_ceiling = 4;
    config.pool.warm_target = 0;
    config.limits.rate_limit_per_minute = 3;
    let ctx = TestContext::with_config(config).await;

    let mut successes = 0;
    let mut limited = 0;
    for i in 0..4 {
        let reply = ctx
            .send("client-a", json!({"id": format!("p{i}"), "method": "ping"}))
            .await;
        if reply["success"] == json!(true) {
            successes += 1;
        } else {
            assert_eq!(reply["error_code"], json!("RATE_LIMITED"));
            limited += 1;
        }
    }
    assert_eq!(successes, 3);
    assert_eq!(limited, 1);

    // A different client has its own window.
    let reply = ctx
        .send("client-b", json!({"id": "pb", "method": "ping"}))
        .await;
    assert_eq!(reply["success"], json!(true));
}

#[tokio::test]
async fn test_injected_selector_rejected_before_execution() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "bad",
                "method": "click",
                "session_id": session,
                "selector": "a onclick=alert(1)"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("UNSAFE_INPUT"));
    assert_eq!(reply["details"]["category"], json!("inline-event-handler"));
    // The rejection never echoes the payload.
    assert!(!reply.to_string().contains("alert(1)"));
    // Nothing reached the session worker.
    assert_eq!(
        ctx.state.sessions.get(&session).unwrap().commands_executed(),
        0
    );
}

#[tokio::test]
async fn test_unsafe_url_rejected() {
    let ctx = TestContext::new().await;
    let session = ctx.create_session("client-a").await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "bad",
                "method": "navigate",
                "session_id": session,
                "url": "javascript:alert(document.cookie)"
            }),
        )
        .await;
    assert_eq!(reply["error_code"], json!("UNSAFE_INPUT"));

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "bad2",
                "method": "navigate",
                "session_id": session,
                "url": "file:///etc/passwd"
            }),
        )
        .await;
    assert_eq!(reply["error_code"], json!("UNSAFE_INPUT"));
}

#[tokio::test]
async fn test_idle_session_is_reaped() {
    let mut config = Config::default();
    config.session.hard_ceiling = 4;
    config.pool.warm_target = 0;
    config.session.idle_timeout = Duration::from_millis(100);
    config.session.reap_interval = Duration::from_millis(50);
    let ctx = TestContext::with_config(config).await;

    let session = ctx.create_session("client-a").await;

    let (shutdown_tx, _) = broadcast::channel(1);
    let reaper = SessionReaper::new(ctx.state.clone());
    let reaper_task = tokio::spawn(reaper.run(shutdown_tx.subscribe()));

    // Idle for well past threshold + one reaper interval.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let reply = ctx
        .send(
            "client-a",
            json!({
                "id": "late",
                "method": "extract",
                "session_id": session,
                "selector": "h1",
                "kind": "text"
            }),
        )
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("SESSION_NOT_FOUND"));

    let _ = shutdown_tx.send(());
    let _ = reaper_task.await;
}

#[tokio::test]
async fn test_active_session_survives_the_reaper() {
    let mut config = Config::default();
    config.session.hard_ceiling = 4;
    config.pool.warm_target = 0;
    config.session.idle_timeout = Duration::from_millis(200);
    config.session.reap_interval = Duration::from_millis(50);
    let ctx = TestContext::with_config(config).await;

    let session = ctx.create_session("client-a").await;
    let (shutdown_tx, _) = broadcast::channel(1);
    let reaper_task = tokio::spawn(SessionReaper::new(ctx.state.clone()).run(shutdown_tx.subscribe()));

    // Keep touching the session below the idle threshold.
    for i in 0..4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let reply = ctx
            .send(
                "client-a",
                json!({"id": format!("t{i}"), "method": "navigate", "session_id": session, "url": EXAMPLE_URL}),
            )
            .await;
        assert_eq!(reply["success"], json!(true), "session was reaped early");
    }

    let _ = shutdown_tx.send(());
    let _ = reaper_task.await;
}

#[tokio::test]
async fn test_session_ceiling_yields_resource_exhausted() {
    let mut config = Config::default();
    config.session.hard_ceiling = 1;
    config.pool.warm_target = 0;
    config.pool.acquire_timeout = Duration::from_millis(100);
    let ctx = TestContext::with_config(config).await;

    ctx.create_session("client-a").await;
    let reply = ctx
        .send("client-a", json!({"id": "c2", "method": "session.create"}))
        .await;
    assert_eq!(reply["success"], json!(false));
    assert_eq!(reply["error_code"], json!("RESOURCE_EXHAUSTED"));
}

#[tokio::test]
async fn test_session_close_releases_capacity() {
    let mut config = Config::default();
    config.session.hard_ceiling = 1;
    config.pool.warm_target = 0;
    config.pool.acquire_timeout = Duration::from_millis(200);
    let ctx = TestContext::with_config(config).await;

    let session = ctx.create_session("client-a").await;
    let reply = ctx
        .send(
            "client-a",
            json!({"id": "close", "method": "session.close", "session_id": session}),
        )
        .await;
    assert_eq!(reply["success"], json!(true));
    assert_eq!(reply["closed"], json!(true));

    // Capacity came back: a new session fits under the ceiling of one.
    let second = ctx.create_session("client-a").await;
    assert_ne!(second, session);
}
