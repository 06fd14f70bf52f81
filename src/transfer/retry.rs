// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::TransferError;

/// Linear backoff: `delay(n) = base × n`, so with the default 2s base the
/// waits are 2s, 4s, 6s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub base_delay: Duration,
}

impl BackoffSchedule {
    pub fn delay(&self, retry_count: usize) -> Duration {
        self.base_delay * retry_count as u32
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    /// Hard per-attempt timeout; an attempt that overruns is aborted and
    /// classified as a retryable failure, not left hanging.
    pub attempt_timeout: Duration,
    pub backoff: BackoffSchedule,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(30),
            backoff: BackoffSchedule::default(),
        }
    }
}

/// Run `op` with bounded retries. Attempts are strictly sequential with an
/// enforced inter-attempt delay; the first non-retryable error or the
/// exhaustion of `max_retries` ends the protocol. On failure no side
/// effects have been committed, so the caller can offer a manual retry.
pub async fn resilient<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, TransferError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransferError>>,
{
    let mut retry_count = 0usize;

    loop {
        let error = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => TransferError::Timeout,
        };

        if !error.is_retryable() || retry_count >= policy.max_retries {
            return Err(error);
        }

        retry_count += 1;
        warn!(
            "transfer attempt failed ({}), retrying ({}/{})",
            error, retry_count, policy.max_retries
        );
        tokio::time::sleep(policy.backoff.delay(retry_count)).await;
    }
}
