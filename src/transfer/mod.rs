// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Resilient transfer protocol
//!
//! One generic retry combinator used by every network-facing caller,
//! parameterized by a backoff schedule. Classification is fixed by the
//! error taxonomy: timeouts, transport failures and 5xx responses are
//! retryable; everything else (4xx including 429, malformed payloads)
//! fails fast.

pub mod download;
pub mod retry;

pub use download::Downloader;
pub use retry::{resilient, BackoffSchedule, RetryPolicy};

use crate::provider::ProviderError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransferError {
    #[error("Transfer timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransferError {
    /// Retry only what might succeed on a second try. Rate limiting (429)
    /// is deliberately not retryable: hammering a throttled endpoint makes
    /// things worse.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Timeout | TransferError::Transport(_) => true,
            TransferError::HttpStatus(status) => (500..=599).contains(status),
            TransferError::Malformed(_) => false,
        }
    }
}

impl From<ProviderError> for TransferError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::UploadTimeout => TransferError::Timeout,
            ProviderError::Transport(m) => TransferError::Transport(m),
            ProviderError::Status { status, .. } => TransferError::HttpStatus(status),
            ProviderError::Malformed(m) => TransferError::Malformed(m),
            ProviderError::NotConfigured => {
                TransferError::Malformed("provider not configured".to_string())
            }
        }
    }
}
