//! # taskdeck-server
//!
//! REST backend for Taskdeck, a personal productivity tracker.
//!
//! This binary provides:
//! - **Session auth**: register, login and logout with signed cookies
//! - **CRUD APIs** for tasks, projects, meetings, notes and tags, each
//!   scoped to the authenticated owner
//! - **Tag assignment** on tasks and project task listings
//! - **Interchangeable storage**: in-memory or SQLite, chosen by config
//! - **Per-IP rate limiting** over a fixed window

mod api;
mod auth;
mod config;
mod error;
mod extract;
mod rate_limit;
mod service;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskdeck_store::Store;

use crate::api::AppState;
use crate::auth::{PasswordHasher, Sessions};
use crate::config::{ServerConfig, StorageBackend};
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();

    // -----------------------------------------------------------------------
    // 2. Initialize tracing (RUST_LOG wins over LOG_LEVEL)
    // -----------------------------------------------------------------------
    let fallback = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start");
            return Err(e.into());
        }
    };

    info!("Starting Taskdeck server v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = open_store(&config).await?;
    info!(backend = store.backend_name(), "Storage ready");

    let sessions = Sessions::new(&config.session_secret, config.session_ttl);
    let passwords = PasswordHasher::new(config.bcrypt_cost)
        .await
        .context("initializing password hasher")?;
    let rate_limiter = RateLimiter::new(config.rate_limit_window, config.rate_limit_max);

    let http_addr = config.http_addr;
    let rate_limit_window = config.rate_limit_window;
    let app_state = AppState {
        store,
        sessions: sessions.clone(),
        passwords,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Drop elapsed rate-limit windows once per window
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(rate_limit_window.max(Duration::from_secs(60)));
        loop {
            interval.tick().await;
            rl.purge_stale().await;
        }
    });

    // Expired session cleanup (every 10 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Store> {
    match config.storage_backend {
        StorageBackend::Memory => Ok(Store::memory()),
        StorageBackend::Sqlite => {
            let url = config
                .database_url
                .clone()
                .context("DATABASE_URL is required for the sqlite backend")?;
            let timeout = config.db_busy_timeout;
            let store = tokio::task::spawn_blocking(move || Store::sqlite(&url, timeout))
                .await
                .context("opening database")??;
            Ok(store)
        }
    }
}
