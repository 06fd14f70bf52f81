// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
//! Target-size search
//!
//! The provider exposes no control over output byte size, only quality,
//! format and dimensions. This module approximates a caller-specified
//! byte budget by probing a descending quality/format grid, measuring each
//! candidate with a real fetch, and keeping the closest one that does not
//! materially overshoot the budget.

pub mod grid;
pub mod search;

pub use grid::{fallback_grid, probe_grid, quality_ladder, verdict, ProbeSpec, Verdict};
pub use search::{CandidateResult, SearchOutcome, TargetSizeSearch};
