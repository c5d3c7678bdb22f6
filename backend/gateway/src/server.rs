//! Router assembly and the HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::HeaderName,
    routing::{delete, get, post, put},
    Router,
};
use devauth_core::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use devauth_service::DevAuthApi;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::api;

pub const DEFAULT_MANAGEMENT_HEADER: &str = "x-devauth-tenant";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Header carrying the tenant scope of management calls.
    pub management_header: HeaderName,
    pub default_per_page: usize,
    pub max_per_page: usize,
}

impl GatewaySettings {
    pub fn new(management_header: &str, default_per_page: usize, max_per_page: usize) -> Result<Self> {
        let management_header = HeaderName::from_bytes(management_header.as_bytes())
            .with_context(|| format!("Invalid management header name: {management_header}"))?;
        Ok(Self { management_header, default_per_page, max_per_page })
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            management_header: HeaderName::from_static(DEFAULT_MANAGEMENT_HEADER),
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
        }
    }
}

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub api: Arc<dyn DevAuthApi>,
    pub settings: Arc<GatewaySettings>,
}

impl GatewayState {
    pub fn new(api: Arc<dyn DevAuthApi>, settings: GatewaySettings) -> Self {
        Self { api, settings: Arc::new(settings) }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route(
            "/api/devices/v1/authentication/auth_requests",
            post(api::submit_auth_request),
        )
        .route("/api/management/v1/devauth/devices", get(api::list_devices))
        .route("/api/management/v1/devauth/devices/:id", get(api::get_device))
        .route(
            "/api/management/v1/devauth/devices/:id/status",
            put(api::set_device_status),
        )
        .route("/api/management/v1/devauth/tokens/:id", delete(api::revoke_token))
        .route("/api/internal/v1/devauth/tokens/verify", post(api::verify_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway until ctrl-c.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Device auth gateway listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
