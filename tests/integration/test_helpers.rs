// tests/integration/test_helpers.rs

//! Test helpers: a full gateway (state, router, workers) wired to the
//! simulated browser backend, driven through the same frame types the
//! WebSocket layer uses.

use browsergate::config::Config;
use browsergate::core::errors::GatewayError;
use browsergate::core::handler::{RouteOutcome, Router};
use browsergate::core::protocol::{ReplyFrame, RequestFrame};
use browsergate::core::state::ServerState;
use browsergate::driver::SimDriver;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

pub struct TestContext {
    pub state: Arc<ServerState>,
    pub driver: Arc<SimDriver>,
    /// Keeps the reload handle's storage alive: the handle holds a weak
    /// reference, and only the first context in the process wins the global
    /// subscriber slot.
    _reload_layer: reload::Layer<EnvFilter, tracing_subscriber::Registry>,
}

impl TestContext {
    /// Builds a gateway with test-friendly defaults and the example site
    /// installed.
    pub async fn new() -> Self {
        let mut config = Config::default();
        config.session.hard_ceiling = 4;
        config.pool.warm_target = 0;
        config.pool.acquire_timeout = std::time::Duration::from_millis(200);
        Self::with_config(config).await
    }

    /// Builds a gateway from explicit configuration.
    pub async fn with_config(config: Config) -> Self {
        // Test logging; losing the global-init race is fine.
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();

        // A dedicated reload layer, held by the context rather than the
        // global subscriber, so `config.set log_level` works in every test
        // regardless of which context registered the subscriber.
        let (filter, reload_handle) = reload::Layer::new(EnvFilter::new("warn"));
        let reload_handle = Arc::new(reload_handle);

        let driver = Arc::new(SimDriver::new());
        super::fixtures::install_example_site(&driver);

        let state = ServerState::initialize(config, driver.clone(), reload_handle)
            .expect("failed to initialize server state");

        Self {
            state,
            driver,
            _reload_layer: filter,
        }
    }

    pub fn router_for(&self, client_id: &str) -> Router {
        let addr: SocketAddr = "127.0.0.1:9".parse().expect("static addr");
        Router::new(self.state.clone(), client_id.to_string(), addr)
    }

    /// Sends one frame as `client_id` and returns the decoded reply, the way
    /// a client would see it.
    pub async fn send(&self, client_id: &str, frame: Value) -> Value {
        let request: RequestFrame =
            serde_json::from_value(frame).expect("test frame must be a valid request");
        let request_id = request.id.clone();
        let router = self.router_for(client_id);

        let reply = match router.route(request).await {
            Ok(RouteOutcome::Immediate(reply)) => reply,
            Ok(RouteOutcome::Pending { request_id, reply }) => match reply.await {
                Ok(executed) => match executed.outcome {
                    Ok(outcome) => ReplyFrame::ok(
                        &request_id,
                        executed.execution_ms,
                        &outcome.payload,
                        outcome.diff.as_ref(),
                    ),
                    Err(e) => ReplyFrame::failure(&request_id, executed.execution_ms, &e),
                },
                Err(_) => ReplyFrame::failure(
                    &request_id,
                    0,
                    &GatewayError::SessionNotFound("session closed".to_string()),
                ),
            },
            Err(e) => ReplyFrame::failure(&request_id, 0, &e),
        };
        serde_json::from_str(&reply.encode()).expect("replies are valid JSON")
    }

    /// Convenience: creates a session for the client and returns its id.
    pub async fn create_session(&self, client_id: &str) -> String {
        let reply = self
            .send(client_id, serde_json::json!({"id": "create", "method": "session.create"}))
            .await;
        assert_eq!(reply["success"], serde_json::json!(true), "create failed: {reply}");
        reply["session_id"]
            .as_str()
            .expect("session id in create reply")
            .to_string()
    }
}
