// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Work-preservation handoff store
//!
//! An anonymous user may process an image before signing in; the download
//! action is what requires identity. The redirect through the identity
//! provider would discard the in-memory result, so the last unsaved result
//! is parked here as a short-lived handoff token and restored (read-once)
//! when the user returns.

pub mod state;
pub mod store;

pub use state::{ProcessingKind, ProcessingState};
pub use store::HandoffStore;

use std::time::Duration;

/// How long a preserved result is trusted. Beyond this the provider asset
/// reference may already be gone, so the slot is purged on next read.
pub const STATE_EXPIRY: Duration = Duration::from_secs(30 * 60);
