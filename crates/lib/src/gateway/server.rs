//! Gateway HTTP server: health probe and the inbound email webhook.

use crate::config::{self, Config, Settings};
use crate::gateway::payload::decode_payload;
use crate::pipeline::{Bridge, Outcome};
use crate::report::LogReporter;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state for the gateway (config, bridge, shutdown token).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub bridge: Arc<Bridge>,
    /// Cancelled on shutdown; in-flight tracker calls derive their token from it.
    pub shutdown: CancellationToken,
}

/// Routes: `GET /` health, `POST <gateway.path>` webhook.
pub fn router(state: GatewayState) -> Router {
    let path = if state.config.gateway.path.starts_with('/') {
        state.config.gateway.path.clone()
    } else {
        format!("/{}", state.config.gateway.path)
    };
    Router::new()
        .route("/", get(health_http))
        .route(&path, post(email_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Fails before binding when the tracker secrets or settings are missing.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let settings = Settings::resolve(&config).context("resolving configuration")?;
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind)
        && settings.allowed_senders.is_none()
        && settings.allowed_recipients.is_none()
    {
        log::warn!(
            "gateway bound to {} with no sender or recipient allow-list; every email will be filed",
            bind
        );
    }
    log::info!(
        "project resolution: explicit project {}, sources: {}",
        settings.resolution.explicit_project.as_deref().unwrap_or("<none>"),
        settings.resolution.strategy
    );

    let bridge = Bridge::from_settings(&settings, Arc::new(LogReporter))
        .context("building tracker client")?;
    let shutdown = CancellationToken::new();
    let state = GatewayState {
        config: Arc::new(config.clone()),
        bridge: Arc::new(bridge),
        shutdown: shutdown.clone(),
    };
    let app = router(state);

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "gateway listening on {} (webhook {})",
        bind_addr,
        config.gateway.path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Cancels the shared token so pending tracker calls fail instead of holding the drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, cancelling in-flight requests");
    shutdown.cancel();
}

/// POST webhook: decodes the provider payload and files a work item.
/// 200 on success or allow-list rejection; 400 with no detail on any failure.
async fn email_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let raw = match decode_payload(&headers, body).await {
        Ok(r) => r,
        Err(e) => {
            state.bridge.reporter().record_failure(&e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let cancel = state.shutdown.child_token();
    match state.bridge.handle(&raw, &cancel).await {
        Ok(Outcome::Created { project, .. }) => {
            log::debug!("webhook handled, work item filed in '{}'", project);
            StatusCode::OK
        }
        Ok(Outcome::Rejected(reason)) => {
            log::debug!("webhook handled, email rejected ({:?})", reason);
            StatusCode::OK
        }
        Err(e) => {
            if e.is_submission_failure() {
                log::error!("request failed: work item not created");
            }
            StatusCode::BAD_REQUEST
        }
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
