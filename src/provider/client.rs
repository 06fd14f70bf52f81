// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for the cloud media provider
//!
//! Speaks a Cloudinary-style REST surface: multipart upload to the
//! management API, URL-segment transformations on the delivery host, and
//! an idempotent resource delete.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::types::{DeleteOutcome, ProviderError, Transformation, UploadOptions, UploadedAsset};
use super::MediaProvider;
use crate::config::ProviderConfig;

/// Hard cap on a single upload round trip, surfaced as a distinct error so
/// callers can tell "the provider is slow" from generic network failures.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-fetch timeout for probe and download requests.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpMediaProvider {
    config: ProviderConfig,
    client: Client,
}

impl HttpMediaProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn upload_endpoint(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.config.api_base, self.config.cloud_name
        )
    }

    fn delete_endpoint(&self) -> String {
        format!(
            "{}/{}/resources/image/upload",
            self.config.api_base, self.config.cloud_name
        )
    }

    fn map_transport(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Transport("request timed out".to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl MediaProvider for HttpMediaProvider {
    async fn upload(
        &self,
        bytes: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadedAsset, ProviderError> {
        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes.to_vec()).file_name("upload"),
        );

        if !options.folder.is_empty() {
            form = form.text("folder", options.folder.clone());
        }
        if let Some(transformation) = &options.transformation {
            if !transformation.is_empty() {
                form = form.text("transformation", transformation.to_url_segment());
            }
        }
        if let Some(format) = options.format {
            form = form.text("format", format.as_str());
        }
        if let Some(threshold) = options.auto_tagging {
            form = form.text("auto_tagging", threshold.to_string());
        }

        let request = self
            .client
            .post(self.upload_endpoint())
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .multipart(form)
            .send();

        // The outer timeout is what distinguishes "upload timeout" from a
        // generic transport failure in the error surface.
        let response = tokio::time::timeout(UPLOAD_TIMEOUT, request)
            .await
            .map_err(|_| ProviderError::UploadTimeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::UploadTimeout
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: UploadApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("JSON parse error: {}", e)))?;

        debug!(
            public_id = %api_response.public_id,
            bytes = api_response.bytes,
            "uploaded asset"
        );

        Ok(UploadedAsset {
            public_id: api_response.public_id,
            url: api_response.secure_url,
            bytes: api_response.bytes,
            width: api_response.width,
            height: api_response.height,
            format: api_response.format,
            tags: api_response.tags,
        })
    }

    fn transform_url(&self, public_id: &str, transformation: &Transformation) -> String {
        let segment = transformation.to_url_segment();
        if segment.is_empty() {
            format!(
                "{}/{}/image/upload/{}",
                self.config.delivery_base, self.config.cloud_name, public_id
            )
        } else {
            format!(
                "{}/{}/image/upload/{}/{}",
                self.config.delivery_base, self.config.cloud_name, segment, public_id
            )
        }
    }

    async fn delete(&self, public_id: &str) -> Result<DeleteOutcome, ProviderError> {
        let response = self
            .client
            .delete(self.delete_endpoint())
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&[("public_ids[]", public_id)])
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(DeleteOutcome::AlreadyGone);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        // The provider reports per-asset outcomes; "not found" is success
        // because a second tab may have reclaimed the asset first.
        let body: DeleteApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("JSON parse error: {}", e)))?;

        match body.deleted.get(public_id).map(String::as_str) {
            Some("not_found") => Ok(DeleteOutcome::AlreadyGone),
            _ => Ok(DeleteOutcome::Deleted),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.bytes().await.map_err(Self::map_transport)
    }
}

#[derive(Debug, Deserialize)]
struct UploadApiResponse {
    public_id: String,
    secure_url: String,
    bytes: u64,
    width: u32,
    height: u32,
    format: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteApiResponse {
    #[serde(default)]
    deleted: std::collections::HashMap<String, String>,
}
