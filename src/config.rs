//! Configuration types for PDF-to-image conversion.
//!
//! Per-request knobs live in [`ConversionOptions`], built either through its
//! validating [`ConversionOptionsBuilder`] (library callers, CLI) or through
//! [`ConversionOptions::from_form`], the tolerant parser used at the HTTP
//! boundary. Tolerant parsing happens exactly once, there; nothing downstream
//! re-validates.
//!
//! Process-wide settings (bind address, upload limit, timeout, tool paths)
//! live in [`ServiceConfig`].

use crate::error::Pdf64Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default rendering density in DPI.
pub const DEFAULT_RESOLUTION: u32 = 300;
/// Default JPEG/PNG quality on ImageMagick's 1–100 scale.
pub const DEFAULT_QUALITY: u8 = 90;
/// Accepted rendering density range.
pub const RESOLUTION_RANGE: std::ops::RangeInclusive<u32> = 36..=1200;

/// Options for one conversion.
///
/// # Example
/// ```rust
/// use pdf64::{ConversionOptions, ImageFormat};
///
/// let options = ConversionOptions::builder()
///     .resolution(150)
///     .quality(80)
///     .merge_pages(true)
///     .format(ImageFormat::Png)
///     .build()
///     .unwrap();
/// assert!(options.merge_pages);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Rendering density (ImageMagick `-density`), in DPI. Default: 300.
    ///
    /// Density is applied *before* the PDF is read, so it controls the pixel
    /// size of every page: an A4 page at 300 DPI is 2480 × 3508 px.
    pub resolution: u32,

    /// Output quality (ImageMagick `-quality`), 1–100. Default: 90.
    ///
    /// For JPEG this is the compression quality; for PNG ImageMagick reads the
    /// digits as zlib level and filter, which is why the default stays high.
    pub quality: u8,

    /// Stack every page vertically into a single image. Default: false.
    pub merge_pages: bool,

    /// Raster format of the produced images. Default: JPEG.
    pub format: ImageFormat,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            quality: DEFAULT_QUALITY,
            merge_pages: false,
            format: ImageFormat::default(),
        }
    }
}

impl ConversionOptions {
    /// Create a new builder for `ConversionOptions`.
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Parse raw form values, never failing.
    ///
    /// - `resolution`: unset, empty, non-numeric or zero → 300; otherwise
    ///   clamped to 36–1200. An ImageMagick `XxY` density keeps its
    ///   horizontal value.
    /// - `quality`: unset, empty, non-numeric or zero → 90; above 100 → 100.
    /// - `merge`: `true`, `1`, `yes`, `on` (any case) → true; anything else → false.
    /// - `format`: `png` → PNG; anything else → JPEG.
    pub fn from_form(
        resolution: Option<&str>,
        quality: Option<&str>,
        merge: Option<&str>,
        format: Option<&str>,
    ) -> Self {
        let resolution = parse_positive(resolution.map(horizontal_density))
            .map(|dpi| dpi.clamp(*RESOLUTION_RANGE.start(), *RESOLUTION_RANGE.end()))
            .unwrap_or(DEFAULT_RESOLUTION);

        let quality = parse_positive(quality)
            .map(|q| q.min(100) as u8)
            .unwrap_or(DEFAULT_QUALITY);

        let merge_pages = merge.map(parse_flag).unwrap_or(false);

        let format = format
            .and_then(|f| f.parse::<ImageFormat>().ok())
            .unwrap_or_default();

        Self {
            resolution,
            quality,
            merge_pages,
            format,
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.map(str::trim)
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&n| n > 0)
}

/// `"150x300"` → `"150"`; anything without an `x` is returned unchanged.
fn horizontal_density(raw: &str) -> &str {
    raw.split(['x', 'X']).next().unwrap_or(raw)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn resolution(mut self, dpi: u32) -> Self {
        self.options.resolution = dpi;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.options.quality = quality;
        self
    }

    pub fn merge_pages(mut self, merge: bool) -> Self {
        self.options.merge_pages = merge;
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.options.format = format;
        self
    }

    /// Build the options, validating ranges.
    pub fn build(self) -> Result<ConversionOptions, Pdf64Error> {
        let o = &self.options;
        if !RESOLUTION_RANGE.contains(&o.resolution) {
            return Err(Pdf64Error::InvalidConfig(format!(
                "resolution must be {}–{} DPI, got {}",
                RESOLUTION_RANGE.start(),
                RESOLUTION_RANGE.end(),
                o.resolution
            )));
        }
        if o.quality == 0 || o.quality > 100 {
            return Err(Pdf64Error::InvalidConfig(format!(
                "quality must be 1–100, got {}",
                o.quality
            )));
        }
        Ok(self.options)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Raster format written by the rasteriser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossy, small; the historical output of the service. (default)
    #[default]
    Jpeg,
    /// Lossless; larger but keeps fine print crisp.
    Png,
}

impl ImageFormat {
    /// File extension ImageMagick uses to pick the encoder.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    /// IANA media type used in the data URI.
    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        })
    }
}

impl FromStr for ImageFormat {
    type Err = Pdf64Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "image/jpeg" => Ok(ImageFormat::Jpeg),
            "png" | "image/png" => Ok(ImageFormat::Png),
            other => Err(Pdf64Error::InvalidConfig(format!(
                "unsupported image format '{other}' (expected jpeg or png)"
            ))),
        }
    }
}

// ── Service configuration ────────────────────────────────────────────────

/// Process-wide settings for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Socket address to listen on. Default: `0.0.0.0:8080`.
    pub bind: String,

    /// Largest accepted request body in bytes. Default: 32 MiB.
    pub max_upload_bytes: usize,

    /// Upper bound on one conversion. `None` disables the limit. Default: 120 s.
    pub request_timeout: Option<Duration>,

    /// Explicit qpdf executable; otherwise `PDF64_QPDF_PATH` or `PATH`.
    pub qpdf_path: Option<PathBuf>,

    /// Explicit ImageMagick executable; otherwise `PDF64_MAGICK_PATH` or `PATH`.
    pub magick_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            max_upload_bytes: 32 << 20,
            request_timeout: Some(Duration::from_secs(120)),
            qpdf_path: None,
            magick_path: None,
        }
    }
}
