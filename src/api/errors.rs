// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::ProviderError;

/// Stable error body: every failure path reduces to `{error, errorType}`,
/// with internals only in the development-only `detail` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    Validation { field: String, message: String },
    RateLimited,
    ProviderNotConfigured,
    UploadTimeout,
    Provider { message: String, detail: Option<String> },
    NotFound(String),
    Internal(String),
}

impl ApiError {
    /// Translate a provider failure into the request-level taxonomy. The
    /// diagnostic detail rides along only when dev diagnostics are on.
    pub fn from_provider(e: ProviderError, dev_diagnostics: bool) -> Self {
        match e {
            ProviderError::NotConfigured => ApiError::ProviderNotConfigured,
            ProviderError::UploadTimeout => ApiError::UploadTimeout,
            other => ApiError::Provider {
                message: "Image processing failed".to_string(),
                detail: dev_diagnostics.then(|| other.to_string()),
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) | ApiError::Validation { .. } => 400,
            ApiError::NotFound(_) => 404,
            ApiError::RateLimited => 429,
            ApiError::ProviderNotConfigured
            | ApiError::Provider { .. }
            | ApiError::Internal(_) => 500,
            ApiError::UploadTimeout => 504,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, detail) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::Validation { field, message } => (
                "validation_error",
                format!("{}: {}", field, message),
                None,
            ),
            ApiError::RateLimited => (
                "rate_limit_exceeded",
                "Too many requests. Please try again later.".to_string(),
                None,
            ),
            ApiError::ProviderNotConfigured => (
                "provider_not_configured",
                "Image service credentials not configured".to_string(),
                None,
            ),
            ApiError::UploadTimeout => (
                "upload_timeout",
                "Upload to the image service timed out".to_string(),
                None,
            ),
            ApiError::Provider { message, detail } => {
                ("provider_error", message.clone(), detail.clone())
            }
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::Internal(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error: message,
            error_type: error_type.to_string(),
            detail,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_response().error)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
