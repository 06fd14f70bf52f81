// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Work-preservation handoff endpoints
//!
//! A client about to bounce through sign-in saves its last processing
//! result here, keyed by an anonymous `x-session-key` header, and takes
//! it back afterward. `GET ?consume=true` is the read-once restore path;
//! a plain `GET` only peeks.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::errors::ApiError;
use super::http_server::AppState;
use crate::handoff::ProcessingState;

const SESSION_HEADER: &str = "x-session-key";

fn session_key(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Validation {
            field: SESSION_HEADER.to_string(),
            message: "header is required".to_string(),
        })
}

pub async fn save_state_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(processing_state): Json<ProcessingState>,
) -> Result<Json<Value>, ApiError> {
    let session = session_key(&headers)?;
    state.handoff.save(&session, processing_state).await;
    Ok(Json(json!({ "saved": true })))
}

#[derive(Debug, Deserialize)]
pub struct LoadStateQuery {
    #[serde(default)]
    pub consume: bool,
}

pub async fn load_state_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoadStateQuery>,
) -> Result<Json<ProcessingState>, ApiError> {
    let session = session_key(&headers)?;

    let slot = if query.consume {
        let taken = state.handoff.take(&session).await;
        if taken.is_some() {
            info!("restored preserved state for session {}", session);
        }
        taken
    } else {
        state.handoff.load(&session).await
    };

    slot.map(Json).ok_or_else(|| {
        ApiError::NotFound("No preserved processing state for this session".to_string())
    })
}

pub async fn clear_state_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let session = session_key(&headers)?;
    state.handoff.clear(&session).await;
    Ok(Json(json!({ "cleared": true })))
}
