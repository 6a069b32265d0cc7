// src/server/initialization.rs

//! Server initialization: TLS, shared state, the browser pool warm-up, and
//! the listener socket.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use crate::driver::{BrowserDriver, ChromiumDriver};
use anyhow::{Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::{TlsAcceptor, rustls};
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, reload};

/// Initializes all server components before starting the main loop.
pub async fn setup(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let acceptor = setup_tls(&config).await?;

    let driver: Arc<dyn BrowserDriver> = Arc::new(ChromiumDriver::new());
    let state = ServerState::initialize(config, driver, log_reload_handle)?;
    info!("server state initialized");

    // Pre-warm the context pool so the first sessions do not pay browser
    // launch latency.
    state.pool.maintain().await;
    info!(warm = state.pool.idle_len(), "browser context pool warmed");

    let (host, port, max_clients) = {
        let config = state.config.lock().await;
        (config.host.clone(), config.port, config.limits.max_clients)
    };
    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("browsergate listening on {host}:{port}");
    let connection_permits = Arc::new(tokio::sync::Semaphore::new(max_clients));

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        acceptor,
        connection_permits,
    })
}

/// Sets up the TLS acceptor if TLS is enabled in the configuration.
async fn setup_tls(config: &Config) -> Result<Option<TlsAcceptor>> {
    if config.tls.enabled {
        info!("TLS is enabled; loading certificate and key");
        let certs = load_certs(&config.tls.cert_path)?;
        let key = load_key(&config.tls.key_path)?;
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
    } else {
        Ok(None)
    }
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file =
        File::open(path).map_err(|e| anyhow!("failed to open certificate file '{path}': {e}"))?;
    let mut reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in '{path}'"));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let key_file =
        File::open(path).map_err(|e| anyhow!("failed to open private key file '{path}': {e}"))?;
    let mut reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| anyhow!("no private key found in '{path}'"))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    if config.api_key.is_none() {
        warn!("WARNING: no 'api_key' configured; any client may connect");
    }
    info!(
        sessions = config.session.hard_ceiling,
        warm_contexts = config.pool.warm_target,
        rate_limit = config.limits.rate_limit_per_minute,
        "gateway limits"
    );
}
