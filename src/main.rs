// src/main.rs

//! The main entry point for the browsergate server.

use anyhow::Result;
use browsergate::config::Config;
use browsergate::server;
use std::env;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("browsergate {VERSION}");
        return Ok(());
    }

    // The config path can be provided via --config; defaults to
    // "browsergate.toml". A missing default file means default settings.
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let mut config = match config_path {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load configuration from \"{path}\": {e:#}");
                std::process::exit(1);
            }
        },
        None if std::path::Path::new("browsergate.toml").exists() => {
            match Config::from_file("browsergate.toml") {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("failed to load configuration from \"browsergate.toml\": {e:#}");
                    std::process::exit(1);
                }
            }
        }
        None => Config::default(),
    };

    // Override the port if provided on the command line.
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        match args.get(port_index + 1).and_then(|s| s.parse::<u16>().ok()) {
            Some(port) => config.port = port,
            None => {
                eprintln!("--port requires a valid port number");
                std::process::exit(1);
            }
        }
    }

    // Logging with a reloadable filter so the level can change at runtime.
    let initial_log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    let reload_handle = Arc::new(reload_handle);

    if let Err(e) = server::run(config, reload_handle).await {
        error!("server runtime error: {e:#}");
        return Err(e);
    }

    Ok(())
}
