// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::grid::{fallback_grid, probe_grid, quality_ladder, verdict, ProbeSpec, Verdict};
use super::grid::FALLBACK_BAND;
use crate::provider::{
    MediaProvider, OutputFormat, ProviderError, Quality, Transformation, UploadOptions,
    UploadedAsset,
};

/// One measured probe. Only the current best is kept across the search.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub format: OutputFormat,
    pub quality: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: u64,
    pub url: String,
}

/// The search result: either the best candidate found, or the plain upload
/// as last resort (the search never fails once the upload succeeded).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub url: String,
    pub public_id: String,
    pub size_bytes: u64,
    pub original_size_bytes: u64,
    pub format: String,
    pub quality: Option<u8>,
    pub width: u32,
    pub height: u32,
    /// `round(achieved / target × 100)`, advisory.
    pub target_achieved: u32,
    /// `round((1 − achieved / original) × 100)`, advisory. Negative means
    /// the fallback asset is larger than the original ever was (never the
    /// case in practice, but the math allows it).
    pub compression_ratio: i64,
    pub probes_issued: usize,
}

/// Best-effort greedy grid search over the provider's coarse controls.
pub struct TargetSizeSearch {
    provider: Arc<dyn MediaProvider>,
}

impl TargetSizeSearch {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }

    /// Upload once, then probe (format, quality[, dimensions]) points until
    /// a candidate lands within ±10% of target or the grid is exhausted.
    /// Caller validates the target bounds before this is invoked.
    pub async fn run(
        &self,
        bytes: Bytes,
        target_bytes: u64,
    ) -> Result<SearchOutcome, ProviderError> {
        let asset = self
            .provider
            .upload(
                bytes,
                &UploadOptions {
                    folder: "compressed-images".to_string(),
                    ..Default::default()
                },
            )
            .await?;

        let original_bytes = asset.bytes;
        let ratio = target_bytes as f64 / original_bytes as f64;
        let ladder = quality_ladder(ratio);

        info!(
            original = original_bytes,
            target = target_bytes,
            ladder_len = ladder.len(),
            "starting target-size search"
        );

        let mut best: Option<CandidateResult> = None;
        let mut probes_issued = 0usize;
        let mut stopped_early = false;

        for spec in probe_grid(ladder) {
            probes_issued += 1;
            if self.consider(&asset, &spec, target_bytes, &mut best).await {
                stopped_early = true;
                break;
            }
        }

        // Quality alone may not get close enough; shed pixels and retry a
        // smaller sweep at the reduced dimensions.
        let needs_fallback = !stopped_early
            && best
                .as_ref()
                .map(|c| distance(c.size_bytes, target_bytes) > target_bytes as f64 * FALLBACK_BAND)
                .unwrap_or(true);

        if needs_fallback {
            let scale = ratio.sqrt();
            let width = ((asset.width as f64 * scale).round() as u32).max(1);
            let height = ((asset.height as f64 * scale).round() as u32).max(1);
            debug!(width, height, "entering dimension-reduction fallback");

            for spec in fallback_grid(width, height) {
                probes_issued += 1;
                if self.consider(&asset, &spec, target_bytes, &mut best).await {
                    break;
                }
            }
        }

        Ok(self.outcome(asset, best, target_bytes, probes_issued))
    }

    /// Probe one grid point and fold it into the running best. Returns
    /// true when the search should stop (candidate within ±10%). A failed
    /// probe fetch is skipped, never fatal.
    async fn consider(
        &self,
        asset: &UploadedAsset,
        spec: &ProbeSpec,
        target_bytes: u64,
        best: &mut Option<CandidateResult>,
    ) -> bool {
        let candidate = match self.probe(asset, spec).await {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    format = %spec.format,
                    quality = spec.quality,
                    "probe failed, skipping: {}",
                    e
                );
                return false;
            }
        };

        match verdict(candidate.size_bytes, target_bytes) {
            Verdict::Overshoot => {
                debug!(
                    size = candidate.size_bytes,
                    "candidate overshoots budget, discarded"
                );
                false
            }
            v => {
                // strict improvement only: ties keep the earlier (higher
                // quality) candidate
                let improves = best
                    .as_ref()
                    .map(|b| {
                        distance(candidate.size_bytes, target_bytes)
                            < distance(b.size_bytes, target_bytes)
                    })
                    .unwrap_or(true);
                if improves {
                    *best = Some(candidate);
                }
                v == Verdict::Ideal
            }
        }
    }

    async fn probe(
        &self,
        asset: &UploadedAsset,
        spec: &ProbeSpec,
    ) -> Result<CandidateResult, ProviderError> {
        let transformation = Transformation {
            format: Some(spec.format),
            quality: Some(Quality::Level(spec.quality)),
            width: spec.width,
            height: spec.height,
            crop: spec.width.map(|_| crate::provider::CropMode::Limit),
            ..Default::default()
        };

        let url = self.provider.transform_url(&asset.public_id, &transformation);
        // the provider doesn't report a derivation's size without a real fetch
        let body = self.provider.fetch(&url).await?;

        Ok(CandidateResult {
            format: spec.format,
            quality: spec.quality,
            width: spec.width,
            height: spec.height,
            size_bytes: body.len() as u64,
            url,
        })
    }

    fn outcome(
        &self,
        asset: UploadedAsset,
        best: Option<CandidateResult>,
        target_bytes: u64,
        probes_issued: usize,
    ) -> SearchOutcome {
        let original_bytes = asset.bytes;

        let (url, size_bytes, format, quality, width, height) = match best {
            Some(c) => {
                info!(
                    format = %c.format,
                    quality = c.quality,
                    size = c.size_bytes,
                    "target-size search picked candidate"
                );
                (
                    c.url,
                    c.size_bytes,
                    c.format.as_str().to_string(),
                    Some(c.quality),
                    c.width.unwrap_or(asset.width),
                    c.height.unwrap_or(asset.height),
                )
            }
            None => {
                // nothing qualified; the untransformed upload is still a result
                warn!("no candidate qualified, returning plain upload");
                (
                    asset.url.clone(),
                    original_bytes,
                    asset.format.clone(),
                    None,
                    asset.width,
                    asset.height,
                )
            }
        };

        SearchOutcome {
            url,
            public_id: asset.public_id,
            size_bytes,
            original_size_bytes: original_bytes,
            format,
            quality,
            width,
            height,
            target_achieved: ((size_bytes as f64 / target_bytes as f64) * 100.0).round() as u32,
            compression_ratio: ((1.0 - size_bytes as f64 / original_bytes as f64) * 100.0).round()
                as i64,
            probes_issued,
        }
    }
}

fn distance(size_bytes: u64, target_bytes: u64) -> f64 {
    (size_bytes as f64 - target_bytes as f64).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::provider::{DeleteOutcome, UploadOptions};

    /// Provider whose derivation sizes are scripted per transformation
    /// segment, e.g. "f_webp,q_70" -> 540_000 bytes.
    struct GridProvider {
        original_bytes: u64,
        width: u32,
        height: u32,
        sizes: HashMap<String, u64>,
        fetches: AtomicUsize,
        fail_segments: Vec<String>,
    }

    impl GridProvider {
        fn new(original_bytes: u64, width: u32, height: u32) -> Self {
            Self {
                original_bytes,
                width,
                height,
                sizes: HashMap::new(),
                fetches: AtomicUsize::new(0),
                fail_segments: Vec::new(),
            }
        }

        fn with_size(mut self, segment: &str, bytes: u64) -> Self {
            self.sizes.insert(segment.to_string(), bytes);
            self
        }

        fn failing(mut self, segment: &str) -> Self {
            self.fail_segments.push(segment.to_string());
            self
        }
    }

    #[async_trait]
    impl MediaProvider for GridProvider {
        async fn upload(
            &self,
            _bytes: Bytes,
            _options: &UploadOptions,
        ) -> Result<UploadedAsset, ProviderError> {
            Ok(UploadedAsset {
                public_id: "compressed-images/test".to_string(),
                url: "https://cdn.test/plain/compressed-images/test".to_string(),
                bytes: self.original_bytes,
                width: self.width,
                height: self.height,
                format: "jpg".to_string(),
                tags: vec![],
            })
        }

        fn transform_url(&self, public_id: &str, t: &Transformation) -> String {
            format!("https://cdn.test/{}/{}", t.to_url_segment(), public_id)
        }

        async fn delete(&self, _public_id: &str) -> Result<DeleteOutcome, ProviderError> {
            Ok(DeleteOutcome::Deleted)
        }

        async fn fetch(&self, url: &str) -> Result<Bytes, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let segment = url
                .strip_prefix("https://cdn.test/")
                .and_then(|rest| rest.split('/').next())
                .unwrap_or("");

            if self.fail_segments.iter().any(|s| s == segment) {
                return Err(ProviderError::Transport("probe failed".to_string()));
            }

            // unscripted derivations measure far over any budget
            let size = self
                .sizes
                .get(segment)
                .copied()
                .unwrap_or(self.original_bytes * 2);
            Ok(Bytes::from(vec![0u8; size as usize]))
        }
    }

    async fn run_search(provider: GridProvider, target: u64) -> (SearchOutcome, usize) {
        let provider = Arc::new(provider);
        let search = TargetSizeSearch::new(provider.clone());
        let outcome = search.run(Bytes::from_static(b"src"), target).await.unwrap();
        let fetches = provider.fetches.load(Ordering::SeqCst);
        (outcome, fetches)
    }

    #[tokio::test]
    async fn test_scenario_first_probe_within_band_stops_search() {
        // original 2,000,000 / target 512,000: ratio 0.256, aggressive
        // ladder, first webp probe at q_70 measures 540,000 — inside ±10%
        let provider =
            GridProvider::new(2_000_000, 1920, 1080).with_size("f_webp,q_70", 540_000);

        let (outcome, fetches) = run_search(provider, 512_000).await;

        assert_eq!(fetches, 1);
        assert_eq!(outcome.quality, Some(70));
        assert_eq!(outcome.format, "webp");
        assert_eq!(outcome.size_bytes, 540_000);
        assert_eq!(outcome.target_achieved, 105);
        assert_eq!(outcome.compression_ratio, 73);
    }

    #[tokio::test]
    async fn test_early_exit_skips_lower_qualities() {
        // target 400,000: ratio 0.4, ladder starts at q_70, and the very
        // first probe already lands inside ±10%
        let provider =
            GridProvider::new(1_000_000, 800, 600).with_size("f_webp,q_70", 420_000);
        let (outcome, fetches) = run_search(provider, 400_000).await;

        assert_eq!(fetches, 1);
        assert_eq!(outcome.quality, Some(70));
    }

    #[tokio::test]
    async fn test_overshoot_candidates_are_discarded() {
        // every probe lands far over budget; fallback also overshoots, so
        // the plain upload comes back as last resort
        let provider = GridProvider::new(1_024_000, 1000, 1000);
        let (outcome, fetches) = run_search(provider, 512_000).await;

        // full phase-1 grid (6 qualities × 2 formats) plus 4 fallback probes
        assert_eq!(fetches, 16);
        assert_eq!(outcome.quality, None);
        assert_eq!(outcome.size_bytes, 1_024_000);
        assert_eq!(outcome.url, "https://cdn.test/plain/compressed-images/test");
    }

    #[tokio::test]
    async fn test_result_never_materially_overshoots() {
        // closest-by-distance candidate is 600,000 (over the +15% cap of
        // 588,800); a worse-by-distance 430,000 is the one that must win
        let provider = GridProvider::new(1_024_000, 1000, 1000)
            .with_size("f_webp,q_70", 600_000)
            .with_size("f_webp,q_60", 430_000);

        let (outcome, _) = run_search(provider, 512_000).await;

        assert!(outcome.size_bytes <= (512_000f64 * 1.15) as u64);
        assert_eq!(outcome.size_bytes, 430_000);
        assert_eq!(outcome.quality, Some(60));
    }

    #[tokio::test]
    async fn test_failed_probe_is_skipped_not_fatal() {
        let provider = GridProvider::new(1_024_000, 1000, 1000)
            .failing("f_webp,q_70")
            .with_size("f_webp,q_60", 500_000);

        let (outcome, fetches) = run_search(provider, 512_000).await;

        assert_eq!(fetches, 2);
        assert_eq!(outcome.quality, Some(60));
        assert_eq!(outcome.size_bytes, 500_000);
    }

    #[tokio::test]
    async fn test_fallback_reduces_dimensions() {
        // nothing within ±20% in phase 1: best quality-only probe is
        // 700,000 against a 409,600 target (still acceptable? no -
        // 700,000 > 409,600 × 1.15, overshoot). Fallback at sqrt(0.4)
        // scale ≈ 0.632 of 1000×1000 -> 632×632 delivers the goods.
        let provider = GridProvider::new(1_024_000, 1000, 1000)
            .with_size("w_632,h_632,c_limit,f_webp,q_60", 420_000);

        let (outcome, _) = run_search(provider, 409_600).await;

        assert_eq!(outcome.quality, Some(60));
        assert_eq!(outcome.width, 632);
        assert_eq!(outcome.height, 632);
        assert_eq!(outcome.size_bytes, 420_000);
    }

    #[tokio::test]
    async fn test_ties_keep_first_found_higher_quality() {
        // equal distance to target at two quality levels — the earlier
        // (higher quality) candidate must win the tie
        let provider = GridProvider::new(1_024_000, 1000, 1000)
            .with_size("f_webp,q_70", 350_000)
            .with_size("f_webp,q_60", 350_000);

        let (outcome, _) = run_search(provider, 452_000).await;
        assert_eq!(outcome.quality, Some(70));
    }
}
