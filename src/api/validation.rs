// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Multipart extraction and upload validation
//!
//! Every tool endpoint takes exactly one image file plus tool-specific
//! text fields. Validation order: single file, size cap, type allowlist.

use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;

use super::errors::ApiError;

pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// MIME allowlist; HEIC/HEIF included for iPhone uploads.
const ALLOWED_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
];

const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "heic", "heif"];

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct ToolForm {
    pub file: UploadedFile,
    pub fields: HashMap<String, String>,
}

impl ToolForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require_field(&self, name: &str) -> Result<&str, ApiError> {
        self.field(name).ok_or_else(|| ApiError::Validation {
            field: name.to_string(),
            message: "missing required field".to_string(),
        })
    }
}

/// Drain a multipart body into one file part plus text fields. A second
/// file part is a hard error, not a silent overwrite.
pub async fn read_tool_form(mut multipart: Multipart) -> Result<ToolForm, ApiError> {
    let mut file: Option<UploadedFile> = None;
    let mut fields = HashMap::new();

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = part.name().unwrap_or_default().to_string();
        let is_file = part.file_name().is_some() || name == "file";

        if is_file {
            if file.is_some() {
                return Err(ApiError::InvalidRequest(
                    "Multiple files are not supported; upload one image at a time".to_string(),
                ));
            }
            let file_name = part.file_name().unwrap_or_default().to_string();
            let content_type = part.content_type().map(|c| c.to_string());
            let bytes = part
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidRequest(format!("Failed to read file: {}", e)))?;
            file = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = part
                .text()
                .await
                .map_err(|e| ApiError::InvalidRequest(format!("Failed to read field: {}", e)))?;
            fields.insert(name, value);
        }
    }

    let file = file.ok_or_else(|| ApiError::InvalidRequest("No file provided".to_string()))?;
    validate_upload(&file)?;

    Ok(ToolForm { file, fields })
}

pub fn validate_upload(file: &UploadedFile) -> Result<(), ApiError> {
    let size = file.bytes.len() as u64;
    if size > MAX_FILE_SIZE {
        return Err(ApiError::InvalidRequest(format!(
            "File too large ({}). Maximum size is 10MB",
            format_file_size(size)
        )));
    }

    let type_ok = file
        .content_type
        .as_deref()
        .map(|t| ALLOWED_TYPES.contains(&t))
        .unwrap_or(false)
        || has_allowed_extension(&file.file_name);

    if !type_ok {
        return Err(ApiError::InvalidRequest(
            "Invalid file type. Only JPEG, PNG, WebP, and HEIC are allowed".to_string(),
        ));
    }

    Ok(())
}

fn has_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Human-readable size for error messages and logs.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[exponent])
}

/// Detect the upload's format for reporting: MIME first, then the file
/// extension, else UNKNOWN.
pub fn detect_file_format(file: &UploadedFile) -> String {
    if let Some(content_type) = &file.content_type {
        if let Some((_, subtype)) = content_type.split_once('/') {
            if !subtype.is_empty() {
                return subtype.to_ascii_uppercase();
            }
        }
    }
    file.file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_uppercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}
