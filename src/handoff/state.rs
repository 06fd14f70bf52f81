// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

/// Which tool produced the preserved result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingKind {
    Compress,
    Optimize,
    BackgroundRemove,
    FormatConvert,
    SocialResizer,
    PassportMaker,
}

/// The preserved record bridging an auth redirect. Holds only a reference
/// to the produced asset — the bytes stay with the provider, and the
/// reference is expected to be deleted once the user downloads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub processed_result_ref: String,
    pub original_size_bytes: u64,
    pub result_size_bytes: u64,
    #[serde(default)]
    pub source_file_name: String,
    /// Present only for the compression tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_size_kb: Option<u64>,
    pub processing_kind: ProcessingKind,
}
