// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
pub mod compress;
pub mod download;
pub mod errors;
pub mod http_server;
pub mod rate_limiter;
pub mod session;
pub mod tools;
pub mod validation;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{build_router, start_server, AppState};
pub use rate_limiter::{RateLimiter, RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW};
