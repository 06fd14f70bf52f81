// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod compress;
pub mod config;
pub mod handoff;
pub mod provider;
pub mod transfer;
pub mod version;

// Re-export the core protocol types
pub use compress::{CandidateResult, SearchOutcome, TargetSizeSearch};
pub use config::{AppConfig, ProviderConfig};
pub use handoff::{HandoffStore, ProcessingKind, ProcessingState};
pub use provider::{
    DeleteOutcome, HttpMediaProvider, MediaProvider, OutputFormat, ProviderError, Quality,
    Transformation, UploadOptions, UploadedAsset,
};
pub use transfer::{BackoffSchedule, Downloader, RetryPolicy, TransferError};
