// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider-layer error taxonomy. Only transport-level failures are ever
/// retried; configuration and malformed-response errors are fatal for the
/// request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider credentials not configured")]
    NotConfigured,

    #[error("Upload timed out")]
    UploadTimeout,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Output format supported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpg,
    Png,
    Avif,
    Gif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Avif => "avif",
            OutputFormat::Gif => "gif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::Webp),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "png" => Ok(OutputFormat::Png),
            "avif" => Ok(OutputFormat::Avif),
            "gif" => Ok(OutputFormat::Gif),
            other => Err(format!("Unsupported format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Auto,
    Level(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// Shrink to fit within the box, never upscale.
    Limit,
    /// Fill the box exactly, cropping as needed.
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    /// Provider picks the most interesting crop region.
    Auto,
    /// Center the crop on a detected face (passport photos).
    Face,
}

/// One derivation request: the coarse controls the provider exposes.
/// Rendered into a comma-separated URL segment, e.g. `f_webp,q_70`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformation {
    pub remove_background: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: Option<CropMode>,
    pub gravity: Option<Gravity>,
    pub background: Option<String>,
    pub format: Option<OutputFormat>,
    pub quality: Option<Quality>,
}

impl Transformation {
    pub fn is_empty(&self) -> bool {
        *self == Transformation::default()
    }

    /// Deterministic URL segment: effect, geometry, background, format,
    /// quality. Empty transformations render to an empty string.
    pub fn to_url_segment(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.remove_background {
            parts.push("e_background_removal".to_string());
        }
        if let Some(w) = self.width {
            parts.push(format!("w_{}", w));
        }
        if let Some(h) = self.height {
            parts.push(format!("h_{}", h));
        }
        if let Some(crop) = self.crop {
            parts.push(match crop {
                CropMode::Limit => "c_limit".to_string(),
                CropMode::Fill => "c_fill".to_string(),
            });
        }
        if let Some(gravity) = self.gravity {
            parts.push(match gravity {
                Gravity::Auto => "g_auto".to_string(),
                Gravity::Face => "g_face".to_string(),
            });
        }
        if let Some(bg) = &self.background {
            parts.push(format!("b_{}", bg));
        }
        if let Some(format) = self.format {
            parts.push(format!("f_{}", format));
        }
        if let Some(quality) = self.quality {
            parts.push(match quality {
                Quality::Auto => "q_auto".to_string(),
                Quality::Level(level) => format!("q_{}", level),
            });
        }

        parts.join(",")
    }
}

/// Options for an ingest upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Storage folder, one per tool (`compressed-images`, `background-removed`...).
    pub folder: String,
    /// Transformation applied during upload (fixed-transform tools).
    pub transformation: Option<Transformation>,
    /// Force the stored format (e.g. png for background removal).
    pub format: Option<OutputFormat>,
    /// Ask the provider to auto-tag the upload at this confidence threshold.
    pub auto_tagging: Option<f32>,
}

/// A stored asset as reported by the provider after upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub public_id: String,
    pub url: String,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The asset was already gone; treated as success.
    AlreadyGone,
}
