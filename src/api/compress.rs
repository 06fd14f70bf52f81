// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Target-size compression endpoint
//!
//! Validates the target bounds up front so the provider is never touched
//! for a request that cannot succeed, then delegates to the probe search.

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::info;

use super::errors::ApiError;
use super::http_server::AppState;
use super::validation::read_tool_form;
use crate::compress::TargetSizeSearch;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub url: String,
    pub public_id: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub target_size: u64,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    pub width: u32,
    pub height: u32,
    pub compression_ratio: i64,
    pub target_achieved: u32,
}

pub async fn compress_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<CompressResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let provider = state.provider()?;

    let form = read_tool_form(multipart).await?;
    let target_kb: u64 = form
        .require_field("targetSize")?
        .parse()
        .map_err(|_| ApiError::Validation {
            field: "targetSize".to_string(),
            message: "must be a positive integer (KB)".to_string(),
        })?;
    if target_kb == 0 {
        return Err(ApiError::Validation {
            field: "targetSize".to_string(),
            message: "must be a positive integer (KB)".to_string(),
        });
    }

    let target_bytes = target_kb
        .checked_mul(1024)
        .ok_or_else(|| ApiError::Validation {
            field: "targetSize".to_string(),
            message: "out of range".to_string(),
        })?;
    let original_bytes = form.file.bytes.len() as u64;
    validate_target(target_bytes, original_bytes)?;

    info!(
        file = %form.file.file_name,
        original = original_bytes,
        target = target_bytes,
        "compress request"
    );

    let outcome = TargetSizeSearch::new(provider)
        .run(form.file.bytes.clone(), target_bytes)
        .await
        .map_err(|e| state.provider_error(e))?;

    Ok(Json(CompressResponse {
        url: outcome.url,
        public_id: outcome.public_id,
        original_size: outcome.original_size_bytes,
        compressed_size: outcome.size_bytes,
        target_size: target_bytes,
        format: outcome.format,
        quality: outcome.quality,
        width: outcome.width,
        height: outcome.height,
        compression_ratio: outcome.compression_ratio,
        target_achieved: outcome.target_achieved,
    }))
}

/// Target bounds, checked against the upload's own size before any
/// provider call. Order matters: the strictest misuse first.
fn validate_target(target_bytes: u64, original_bytes: u64) -> Result<(), ApiError> {
    if target_bytes >= original_bytes {
        return Err(ApiError::Validation {
            field: "targetSize".to_string(),
            message: "target size must be smaller than the original file".to_string(),
        });
    }
    if target_bytes * 100 < original_bytes {
        return Err(ApiError::Validation {
            field: "targetSize".to_string(),
            message: "target size too small — compression to under 1% of the original is unachievable"
                .to_string(),
        });
    }
    if target_bytes * 100 > original_bytes * 95 {
        return Err(ApiError::Validation {
            field: "targetSize".to_string(),
            message: "target size too close to the original — not worth compressing".to_string(),
        });
    }
    Ok(())
}
