// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use crate::provider::OutputFormat;

/// Webp first: it generally compresses better, so it gets first claim on
/// the probe budget.
const FORMATS: [OutputFormat; 2] = [OutputFormat::Webp, OutputFormat::Jpg];

/// Quality sweep for the dimension-reduction fallback phase.
const FALLBACK_QUALITIES: [u8; 4] = [60, 50, 40, 30];

/// A candidate may land at most 15% over target before it is discarded,
/// however close its absolute distance.
pub const ACCEPT_OVERSHOOT: f64 = 1.15;

/// Within ±10% of target is good enough to stop spending probe requests.
pub const SUCCESS_BAND: f64 = 0.10;

/// Outside ±20% after phase 1 triggers the dimension-reduction fallback.
pub const FALLBACK_BAND: f64 = 0.20;

/// One probe request: a (format, quality[, dimensions]) point on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSpec {
    pub format: OutputFormat,
    pub quality: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Pick the quality candidates from how aggressive the compression must
/// be: mild targets don't warrant probing the low-quality tail, small
/// targets do.
pub fn quality_ladder(compression_ratio: f64) -> &'static [u8] {
    if compression_ratio > 0.5 {
        &[80, 70, 60, 50, 40]
    } else {
        &[70, 60, 50, 40, 30, 20]
    }
}

/// Phase-1 grid: every format in preference order crossed with the quality
/// ladder, descending, no dimension change.
pub fn probe_grid(ladder: &'static [u8]) -> impl Iterator<Item = ProbeSpec> {
    FORMATS.into_iter().flat_map(move |format| {
        ladder.iter().map(move |&quality| ProbeSpec {
            format,
            quality,
            width: None,
            height: None,
        })
    })
}

/// Phase-2 grid: a smaller webp-only sweep at reduced dimensions.
pub fn fallback_grid(width: u32, height: u32) -> impl Iterator<Item = ProbeSpec> {
    FALLBACK_QUALITIES.into_iter().map(move |quality| ProbeSpec {
        format: OutputFormat::Webp,
        quality,
        width: Some(width),
        height: Some(height),
    })
}

/// How a measured candidate relates to the target budget. Pure function so
/// the stopping condition stays out of the probe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Within ±10% of target: stop probing.
    Ideal,
    /// Usable candidate (≤ +15% over target), keep probing for better.
    Acceptable,
    /// Blew the budget by more than 15%: discard even if numerically close.
    Overshoot,
}

pub fn verdict(size_bytes: u64, target_bytes: u64) -> Verdict {
    let size = size_bytes as f64;
    let target = target_bytes as f64;

    if size > target * ACCEPT_OVERSHOOT {
        Verdict::Overshoot
    } else if (size - target).abs() <= target * SUCCESS_BAND {
        Verdict::Ideal
    } else {
        Verdict::Acceptable
    }
}
