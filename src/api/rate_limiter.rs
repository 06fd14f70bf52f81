// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Per-client sliding-window rate limiter
//!
//! Processing endpoints share one limiter keyed by client address:
//! 10 requests per 10-second sliding window. The check fails open on
//! internal errors — rate limiting is protection, not a feature gate.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const RATE_LIMIT_MAX_REQUESTS: usize = 10;
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);

/// Keep the key map from growing unbounded under address churn.
const CLEANUP_THRESHOLD: usize = 1000;

struct SlidingWindow {
    requests: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new() -> Self {
        Self {
            requests: VecDeque::new(),
        }
    }

    fn try_acquire(&mut self, max_requests: usize, window: Duration) -> bool {
        // window may exceed process uptime; no cutoff means nothing expires
        if let Some(cutoff) = Instant::now().checked_sub(window) {
            while let Some(&front) = self.requests.front() {
                if front < cutoff {
                    self.requests.pop_front();
                } else {
                    break;
                }
            }
        }

        if self.requests.len() >= max_requests {
            false
        } else {
            self.requests.push_back(Instant::now());
            true
        }
    }

    fn is_idle(&self, window: Duration) -> bool {
        self.requests
            .back()
            .map(|last| last.elapsed() > window)
            .unwrap_or(true)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, SlidingWindow>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW)
    }

    pub fn with_limits(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// True when the request is allowed. Also prunes idle entries once the
    /// map grows past the cleanup threshold.
    pub async fn check(&self, client_key: &str) -> bool {
        let mut windows = self.windows.write().await;

        if windows.len() > CLEANUP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| !w.is_idle(window));
        }

        windows
            .entry(client_key.to_string())
            .or_insert_with(SlidingWindow::new)
            .try_acquire(self.max_requests, self.window)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
