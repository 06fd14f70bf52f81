// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Router assembly and server startup

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::errors::ApiError;
use super::rate_limiter::RateLimiter;
use super::{compress, download, session, tools};
use crate::config::AppConfig;
use crate::handoff::HandoffStore;
use crate::provider::{HttpMediaProvider, MediaProvider, ProviderError};
use crate::version;

/// Multipart bodies may slightly exceed the 10MB file cap with boundary
/// overhead; the real limit is enforced in validation.
const BODY_LIMIT: usize = 12 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    provider: Option<Arc<dyn MediaProvider>>,
    pub handoff: HandoffStore,
    pub rate_limiter: RateLimiter,
    pub dev_diagnostics: bool,
    /// Host the download proxy will fetch from; anything else is rejected.
    pub delivery_host: Option<String>,
}

impl AppState {
    pub fn new(
        provider: Option<Arc<dyn MediaProvider>>,
        handoff: HandoffStore,
        dev_diagnostics: bool,
        delivery_host: Option<String>,
    ) -> Self {
        Self {
            provider,
            handoff,
            rate_limiter: RateLimiter::new(),
            dev_diagnostics,
            delivery_host,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let delivery_host = config
            .provider
            .as_ref()
            .and_then(|p| p.delivery_host());
        let provider: Option<Arc<dyn MediaProvider>> = config
            .provider
            .as_ref()
            .map(|p| Arc::new(HttpMediaProvider::new(p.clone())) as Arc<dyn MediaProvider>);
        let handoff = match &config.state_file {
            Some(path) => HandoffStore::with_state_file(path.clone()),
            None => HandoffStore::new(),
        };

        Self::new(provider, handoff, config.dev_diagnostics, delivery_host)
    }

    pub fn is_provider_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Result<Arc<dyn MediaProvider>, ApiError> {
        self.provider
            .clone()
            .ok_or(ApiError::ProviderNotConfigured)
    }

    pub fn provider_error(&self, e: ProviderError) -> ApiError {
        ApiError::from_provider(e, self.dev_diagnostics)
    }

    pub async fn enforce_rate_limit(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.rate_limiter.check(&client_key(headers)).await {
            Ok(())
        } else {
            Err(ApiError::RateLimited)
        }
    }
}

/// First hop of `x-forwarded-for`, else loopback. Good enough for a
/// per-address sliding window behind the usual proxies.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // one processing endpoint per tool
        .route("/v1/compress", post(compress::compress_handler))
        .route("/v1/optimize", post(tools::optimize_handler))
        .route("/v1/background-remove", post(tools::background_remove_handler))
        .route("/v1/format-convert", post(tools::format_convert_handler))
        .route("/v1/social-resize", post(tools::social_resize_handler))
        .route("/v1/passport", post(tools::passport_handler))
        .route("/v1/auto-tag", post(tools::auto_tag_handler))
        // download proxy + asset reclaim
        .route("/v1/download", get(download::download_handler))
        .route("/v1/assets", delete(download::delete_asset_handler))
        // work-preservation handoff slot
        .route(
            "/v1/session/state",
            post(session::save_state_handler)
                .get(session::load_state_handler)
                .delete(session::clear_state_handler),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config);
    if !state.is_provider_configured() {
        tracing::warn!("provider credentials missing; tool endpoints will answer 500");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("API server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": version::VERSION,
        "buildDate": version::BUILD_DATE,
        "providerConfigured": state.is_provider_configured(),
    }))
}
