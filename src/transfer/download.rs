// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

use super::retry::{resilient, RetryPolicy};
use super::TransferError;
use crate::provider::MediaProvider;

/// Download-side of the transfer protocol: fetch with bounded retries and,
/// only after a confirmed success, reclaim the provider asset.
#[derive(Clone)]
pub struct Downloader {
    provider: Arc<dyn MediaProvider>,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(provider: Arc<dyn MediaProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Fetch an asset through the retry protocol.
    pub async fn download(&self, url: &str) -> Result<Bytes, TransferError> {
        let provider = self.provider.clone();
        let url = url.to_string();

        resilient(&self.policy, move || {
            let provider = provider.clone();
            let url = url.clone();
            async move { provider.fetch(&url).await.map_err(TransferError::from) }
        })
        .await
    }

    /// Fetch, then delete the source asset to reclaim provider storage.
    ///
    /// The delete is strictly gated on a successful transfer: at most one
    /// deletion, and zero deletions on failure so the user can retry
    /// against a still-live asset. A failed delete after a good download
    /// is logged and swallowed — the provider delete is idempotent and a
    /// stray asset is preferable to a failed download.
    pub async fn download_and_reclaim(
        &self,
        url: &str,
        public_id: &str,
    ) -> Result<Bytes, TransferError> {
        let bytes = self.download(url).await?;

        match self.provider.delete(public_id).await {
            Ok(_) => info!("🗑️ reclaimed asset {}", public_id),
            Err(e) => warn!("failed to reclaim asset {}: {}", public_id, e),
        }

        Ok(bytes)
    }
}
