// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Everything comes from environment variables (with `.env` support in the
//! binary); the CLI only overrides the bind port and the handoff state file.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Credentials and endpoints for the transformation provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Management API base, e.g. `https://api.cloudinary.com/v1_1`
    pub api_base: String,
    /// Delivery base for transformed-asset URLs, e.g. `https://res.cloudinary.com`
    pub delivery_base: String,
}

impl ProviderConfig {
    /// Read provider credentials from the environment. Returns `None` when
    /// any of the three credentials is missing; the server still boots in
    /// that case and tool endpoints answer with a configuration error.
    pub fn from_env() -> Option<Self> {
        let cloud_name = env::var("CLOUDINARY_CLOUD_NAME").ok()?;
        let api_key = env::var("CLOUDINARY_API_KEY").ok()?;
        let api_secret = env::var("CLOUDINARY_API_SECRET").ok()?;

        Some(Self {
            cloud_name,
            api_key,
            api_secret,
            api_base: env::var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|_| "https://api.cloudinary.com/v1_1".to_string()),
            delivery_base: env::var("CLOUDINARY_DELIVERY_BASE")
                .unwrap_or_else(|_| "https://res.cloudinary.com".to_string()),
        })
    }

    /// Host of the delivery base, used to validate download-proxy URLs.
    pub fn delivery_host(&self) -> Option<String> {
        url::Url::parse(&self.delivery_base)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub provider: Option<ProviderConfig>,
    /// Optional JSON file backing the handoff store across restarts.
    pub state_file: Option<PathBuf>,
    /// When set, error responses carry a diagnostic `detail` field.
    pub dev_diagnostics: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let dev_diagnostics = env::var("DEV_DIAGNOSTICS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            provider: ProviderConfig::from_env(),
            state_file: env::var("HANDOFF_STATE_FILE").ok().map(PathBuf::from),
            dev_diagnostics,
        }
    }
}
