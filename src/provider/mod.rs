// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Transformation provider seam
//!
//! All actual image work (compression, cropping, background removal) happens
//! inside the external cloud media service. This module owns the trait the
//! rest of the crate talks to and the reqwest-backed implementation.

pub mod client;
pub mod types;

pub use client::HttpMediaProvider;
pub use types::{
    CropMode, DeleteOutcome, Gravity, OutputFormat, ProviderError, Quality, Transformation,
    UploadOptions, UploadedAsset,
};

use async_trait::async_trait;
use bytes::Bytes;

/// The external media service: upload, transform, delete, fetch.
///
/// `delete` must tolerate "already gone" — concurrent downloads of the same
/// asset may both attempt to reclaim it.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Upload image bytes, optionally applying a transformation on ingest.
    /// Returns the stored asset with its canonical dimensions and byte size.
    async fn upload(
        &self,
        bytes: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadedAsset, ProviderError>;

    /// Build a delivery URL for a derived (transformed) version of an asset.
    /// No network round trip; the provider renders derivations on first fetch.
    fn transform_url(&self, public_id: &str, transformation: &Transformation) -> String;

    /// Remove an asset from provider storage. Idempotent.
    async fn delete(&self, public_id: &str) -> Result<DeleteOutcome, ProviderError>;

    /// Fetch an asset's bytes. The only way to learn a derivation's real
    /// size, so the target-size search uses this for every probe.
    async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError>;
}
