// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Fixed-transform tool endpoints
//!
//! Each tool is one upload with a transformation baked in at ingest, so
//! the provider reports the derived asset's real size straight away.

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::info;

use super::errors::ApiError;
use super::http_server::AppState;
use super::validation::{detect_file_format, read_tool_form, ToolForm};
use crate::provider::{
    CropMode, Gravity, OutputFormat, Quality, Transformation, UploadOptions, UploadedAsset,
};

const AUTO_TAG_CONFIDENCE: f32 = 0.7;

/// Named passport/ID presets, pixel dimensions at 300dpi.
const PASSPORT_PRESETS: [(&str, u32, u32); 7] = [
    ("us-2x2", 600, 600),
    ("us-visa", 600, 600),
    ("eu-35x45", 413, 531),
    ("uk-35x45", 413, 531),
    ("in-35x45", 413, 531),
    ("school-id", 295, 413),
    ("resume", 295, 413),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImageResponse {
    pub url: String,
    pub public_id: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

impl From<UploadedAsset> for ProcessedImageResponse {
    fn from(asset: UploadedAsset) -> Self {
        Self {
            url: asset.url,
            public_id: asset.public_id,
            size: asset.bytes,
            width: asset.width,
            height: asset.height,
            format: asset.format,
        }
    }
}

fn optional_u32(form: &ToolForm, name: &str) -> Result<Option<u32>, ApiError> {
    match form.field(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ApiError::Validation {
                field: name.to_string(),
                message: "must be a positive integer".to_string(),
            }),
    }
}

fn required_u32(form: &ToolForm, name: &str) -> Result<u32, ApiError> {
    form.require_field(name)?
        .parse::<u32>()
        .map_err(|_| ApiError::Validation {
            field: name.to_string(),
            message: "must be a positive integer".to_string(),
        })
}

fn optional_quality(form: &ToolForm) -> Result<Option<Quality>, ApiError> {
    match form.field("quality") {
        None => Ok(None),
        Some(raw) => {
            let level: u8 = raw.parse().map_err(|_| ApiError::Validation {
                field: "quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            })?;
            if !(1..=100).contains(&level) {
                return Err(ApiError::Validation {
                    field: "quality".to_string(),
                    message: "must be between 1 and 100".to_string(),
                });
            }
            Ok(Some(Quality::Level(level)))
        }
    }
}

async fn process_upload(
    state: &AppState,
    form: &ToolForm,
    options: UploadOptions,
) -> Result<UploadedAsset, ApiError> {
    let provider = state.provider()?;
    provider
        .upload(form.file.bytes.clone(), &options)
        .await
        .map_err(|e| state.provider_error(e))
}

/// `POST /v1/optimize` — width/height fill crop with quality and format
/// overrides, everything optional.
pub async fn optimize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ProcessedImageResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let form = read_tool_form(multipart).await?;

    let width = optional_u32(&form, "width")?;
    let height = optional_u32(&form, "height")?;
    let format = match form.field("format") {
        None => None,
        Some(raw) => Some(raw.parse::<OutputFormat>().map_err(|message| {
            ApiError::Validation {
                field: "format".to_string(),
                message,
            }
        })?),
    };
    let quality = optional_quality(&form)?.or(Some(Quality::Auto));

    let transformation = Transformation {
        width,
        height,
        crop: width.or(height).map(|_| CropMode::Fill),
        format,
        quality,
        ..Default::default()
    };

    info!(file = %form.file.file_name, "optimize request");
    let asset = process_upload(
        &state,
        &form,
        UploadOptions {
            folder: "optimized-images".to_string(),
            transformation: Some(transformation),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(asset.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemoveResponse {
    pub processed_url: String,
    pub public_id: String,
}

/// `POST /v1/background-remove` — background-removal effect, stored as
/// png to keep the alpha channel.
pub async fn background_remove_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<BackgroundRemoveResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let form = read_tool_form(multipart).await?;

    info!(file = %form.file.file_name, "background removal request");
    let asset = process_upload(
        &state,
        &form,
        UploadOptions {
            folder: "background-removed".to_string(),
            transformation: Some(Transformation {
                remove_background: true,
                ..Default::default()
            }),
            format: Some(OutputFormat::Png),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(BackgroundRemoveResponse {
        processed_url: asset.url,
        public_id: asset.public_id,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConvertResponse {
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub original_format: String,
    pub size: u64,
}

/// `POST /v1/format-convert` — store the upload re-encoded in the
/// requested format.
pub async fn format_convert_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<FormatConvertResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let form = read_tool_form(multipart).await?;

    let format = form
        .require_field("format")?
        .parse::<OutputFormat>()
        .map_err(|message| ApiError::Validation {
            field: "format".to_string(),
            message,
        })?;
    let quality = optional_quality(&form)?;
    let original_format = detect_file_format(&form.file);

    info!(file = %form.file.file_name, target_format = %format, "format conversion request");
    let asset = process_upload(
        &state,
        &form,
        UploadOptions {
            folder: "converted-images".to_string(),
            transformation: quality.map(|q| Transformation {
                quality: Some(q),
                ..Default::default()
            }),
            format: Some(format),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(FormatConvertResponse {
        url: asset.url,
        public_id: asset.public_id,
        format: asset.format,
        original_format,
        size: asset.bytes,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialResizeResponse {
    pub url: String,
    pub public_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// `POST /v1/social-resize` — exact-dimensions fill crop with automatic
/// gravity, quality and delivery format. Previews land in their own
/// folder so reclaim sweeps can tell them apart.
pub async fn social_resize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SocialResizeResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let form = read_tool_form(multipart).await?;

    let width = required_u32(&form, "width")?;
    let height = required_u32(&form, "height")?;
    let preset = form.field("preset").map(str::to_string);
    let preview = form
        .field("preview")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let folder = if preview {
        "social-preview"
    } else {
        "social-resized"
    };

    info!(
        file = %form.file.file_name,
        width,
        height,
        preset = preset.as_deref().unwrap_or("custom"),
        "social resize request"
    );
    let asset = process_upload(
        &state,
        &form,
        UploadOptions {
            folder: folder.to_string(),
            transformation: Some(Transformation {
                width: Some(width),
                height: Some(height),
                crop: Some(CropMode::Fill),
                gravity: Some(Gravity::Auto),
                quality: Some(Quality::Auto),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(SocialResizeResponse {
        url: asset.url,
        public_id: asset.public_id,
        width,
        height,
        preset,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassportResponse {
    pub url: String,
    pub public_id: String,
    pub preset: String,
    pub width: u32,
    pub height: u32,
}

/// `POST /v1/passport` — named document preset, face-centered fill crop
/// on a white background.
pub async fn passport_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<PassportResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let form = read_tool_form(multipart).await?;

    let preset = form.require_field("preset")?;
    let (name, width, height) = PASSPORT_PRESETS
        .iter()
        .find(|(name, _, _)| *name == preset)
        .copied()
        .ok_or_else(|| ApiError::Validation {
            field: "preset".to_string(),
            message: format!("unknown preset '{}'", preset),
        })?;

    info!(file = %form.file.file_name, preset = name, "passport photo request");
    let asset = process_upload(
        &state,
        &form,
        UploadOptions {
            folder: "passport-photos".to_string(),
            transformation: Some(Transformation {
                width: Some(width),
                height: Some(height),
                crop: Some(CropMode::Fill),
                gravity: Some(Gravity::Face),
                background: Some("white".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    )
    .await?;

    Ok(Json(PassportResponse {
        url: asset.url,
        public_id: asset.public_id,
        preset: name.to_string(),
        width,
        height,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoTagResponse {
    pub tags: Vec<String>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /v1/auto-tag` — provider-side content tagging with a local
/// heuristic fallback when the provider returns none.
pub async fn auto_tag_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<AutoTagResponse>, ApiError> {
    state.enforce_rate_limit(&headers).await?;
    let form = read_tool_form(multipart).await?;

    info!(file = %form.file.file_name, "auto-tag request");
    let asset = process_upload(
        &state,
        &form,
        UploadOptions {
            folder: "auto-tagged".to_string(),
            auto_tagging: Some(AUTO_TAG_CONFIDENCE),
            ..Default::default()
        },
    )
    .await?;

    let (tags, message) = if asset.tags.is_empty() {
        (
            fallback_tags(&form.file.file_name, form.file.bytes.len() as u64),
            Some("Content tagging unavailable; returned basic attributes".to_string()),
        )
    } else {
        (asset.tags.clone(), None)
    };

    Ok(Json(AutoTagResponse {
        tags,
        image_url: asset.url,
        message,
    }))
}

/// Tags derivable without looking at the pixels: file extension and a
/// coarse size class.
fn fallback_tags(file_name: &str, size_bytes: u64) -> Vec<String> {
    let mut tags = vec![
        "image".to_string(),
        "digital".to_string(),
        "upload".to_string(),
    ];

    if let Some((_, ext)) = file_name.rsplit_once('.') {
        let ext = ext.to_ascii_lowercase();
        if !ext.is_empty() && !tags.contains(&ext) {
            tags.push("photo".to_string());
            tags.push(ext);
        }
    }

    let size_class = if size_bytes > 5 * 1024 * 1024 {
        "high-resolution"
    } else if size_bytes < 512 * 1024 {
        "thumbnail"
    } else {
        "standard-quality"
    };
    tags.push(size_class.to_string());

    tags
}
