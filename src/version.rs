// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BUILD_DATE: &str = "2026-08-26";
