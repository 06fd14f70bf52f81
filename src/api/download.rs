// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Download proxy and asset reclaim
//!
//! Browsers can't force a download off a third-party CDN URL, so the
//! server fetches the asset and streams it back as an attachment. When
//! the caller names the asset's public id, the source asset is deleted
//! only after the transfer succeeded.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::errors::ApiError;
use super::http_server::AppState;
use crate::provider::DeleteOutcome;
use crate::transfer::{Downloader, TransferError};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: String,
    pub filename: Option<String>,
    #[serde(alias = "publicId")]
    pub public_id: Option<String>,
}

pub async fn download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let provider = state.provider()?;

    validate_download_url(&query.url, state.delivery_host.as_deref())?;
    let filename = sanitize_filename(query.filename.as_deref().unwrap_or("download"));

    info!(url = %query.url, reclaim = query.public_id.is_some(), "download request");

    let downloader = Downloader::new(provider);
    let bytes = match &query.public_id {
        Some(public_id) => downloader.download_and_reclaim(&query.url, public_id).await,
        None => downloader.download(&query.url).await,
    }
    .map_err(|e| transfer_error(&state, e))?;

    let response = (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                content_type_for(&filename).to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response();

    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAssetRequest {
    pub public_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAssetResponse {
    pub deleted: bool,
    pub already_gone: bool,
}

/// `DELETE /v1/assets` — idempotent: deleting an asset that is already
/// gone reports success.
pub async fn delete_asset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeleteAssetRequest>,
) -> Result<Json<DeleteAssetResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let provider = state.provider()?;

    if request.public_id.trim().is_empty() {
        return Err(ApiError::Validation {
            field: "publicId".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    let outcome = provider
        .delete(&request.public_id)
        .await
        .map_err(|e| state.provider_error(e))?;

    info!("🗑️ deleted asset {}", request.public_id);
    Ok(Json(DeleteAssetResponse {
        deleted: true,
        already_gone: outcome == DeleteOutcome::AlreadyGone,
    }))
}

/// Only https URLs on the provider's delivery host may be proxied; this
/// endpoint must not become an open relay.
fn validate_download_url(raw: &str, delivery_host: Option<&str>) -> Result<(), ApiError> {
    let url = Url::parse(raw)
        .map_err(|_| ApiError::InvalidRequest("Invalid download URL".to_string()))?;

    if url.scheme() != "https" {
        return Err(ApiError::InvalidRequest(
            "Only https download URLs are allowed".to_string(),
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ApiError::InvalidRequest("Invalid download URL".to_string()))?;

    if let Some(expected) = delivery_host {
        if host != expected {
            return Err(ApiError::InvalidRequest(
                "Download URL does not point at the image service".to_string(),
            ));
        }
    }

    Ok(())
}

/// Strip anything that could break out of the Content-Disposition header
/// or smuggle a path.
fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '"' | '\r' | '\n' | '\0'))
        .collect();
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

fn transfer_error(state: &AppState, e: TransferError) -> ApiError {
    match e {
        TransferError::Timeout => ApiError::Provider {
            message: "Download timed out after retries".to_string(),
            detail: None,
        },
        TransferError::HttpStatus(404) => {
            ApiError::NotFound("Asset not found at the image service".to_string())
        }
        other => ApiError::Provider {
            message: "Download failed".to_string(),
            detail: state.dev_diagnostics.then(|| other.to_string()),
        },
    }
}
