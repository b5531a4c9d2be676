//! ops-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config,
//! builds the engine and supervisor, wires middleware, and starts the HTTP
//! server. All route handlers live in `routes.rs`; all shared state types
//! live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ops_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use ops_config::EngineConfig;
use ops_erp::UpsertClient;
use ops_runtime::{Supervisor, SyncEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = match std::env::var("OPS_CONFIG_FILES") {
        Ok(files) => {
            let paths: Vec<&str> = files.split(':').filter(|p| !p.is_empty()).collect();
            ops_config::load_layered(&paths)?
        }
        Err(_) => ops_config::load_layered(&[])?,
    };
    let cfg = EngineConfig::from_loaded(&loaded);
    info!(config_hash = %cfg.config_hash, "configuration loaded");

    let pool = ops_db::connect_from_env().await?;
    ops_db::migrate(&pool).await?;

    let engine = SyncEngine::new(pool, cfg.clone());
    let erp = UpsertClient::new(cfg.erp.clone()).context("build upsert client")?;
    let supervisor = Arc::new(Supervisor::start(engine.clone(), erp).await);

    let shared = Arc::new(state::AppState::new(engine, Arc::clone(&supervisor)));
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8918)));
    info!("ops-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    // HTTP is down; let the engine finish its in-flight job.
    supervisor.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("OPS_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
