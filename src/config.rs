//! Configuration for a map-extraction run.
//!
//! All behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ExtractError;

/// Configuration for a map-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2maps::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(150)
///     .workers(8)
///     .temperature(0.7)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 150.
    ///
    /// 150 DPI keeps text legible for the vision classifier while keeping
    /// page images well under typical API upload limits. The same render is
    /// reused for segmentation, so this also sets final crop resolution.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// A safety cap independent of DPI: a 150-DPI render of a poster-sized
    /// page could otherwise exhaust memory on its own.
    pub max_rendered_pixels: u32,

    /// Number of concurrent page-processing workers. Default: 5.
    ///
    /// Detection and segmentation are network-bound capability calls, so a
    /// small pool cuts wall-clock time substantially. Upstream APIs rate-limit
    /// aggressively; keep this in the 5–15 range.
    pub workers: usize,

    /// Retry attempts per page for the detection call. Default: 3.
    pub detect_retries: u32,

    /// Initial backoff before a detection retry, in milliseconds. Default: 2000.
    ///
    /// Doubles after each attempt (2 s → 4 s). Detection failure degrades to
    /// "no map on this page", so the budget stays small.
    pub detect_backoff_ms: u64,

    /// Maximum perimeter-drawing attempts per page. Default: 5.
    ///
    /// Each attempt is a fresh generation call; there is no partial retry of
    /// just the geometry step because the drawn perimeter itself may be wrong.
    pub segment_attempts: u32,

    /// Sampling temperature for the perimeter-drawing call. Default: 0.5.
    ///
    /// Mid-range on purpose: a fully deterministic model that draws a bad
    /// perimeter will draw the same bad perimeter five times.
    pub temperature: f32,

    /// Embedded-image area threshold as a fraction of page area. Default: 0.25.
    ///
    /// Structural extraction only considers embedded rasters covering at
    /// least this fraction of the page; smaller images are illustrations.
    pub embedded_threshold_fraction: f32,

    /// Page coverage above which a lone embedded raster means "flattened page".
    /// Default: 0.8.
    ///
    /// A flattened page IS one big image, so structural extraction would just
    /// return the whole page; the orchestrator short-circuits to segmentation.
    pub flattened_coverage: f32,

    /// Minimum red pixels for a generated perimeter to count. Default: 100.
    pub min_red_pixels: u64,

    /// Minimum bounding-box area (px²) for an accepted region. Default: 1000.
    pub min_bbox_area: u64,

    /// Minimum connected-component pixel count kept by region labelling.
    /// Default: 10 000. Smaller blobs are compression noise.
    pub min_component_area: u64,

    /// Radius of the morphological-closing structuring element. Default: 25
    /// (a 51×51 square), large enough to fuse the four edges of a hand-drawn
    /// rectangle into one blob.
    pub closing_radius: u8,

    /// Inward inset applied to the final crop, in generated-image pixels.
    /// Default: 5. Crops inside the drawn line so the border itself is excluded.
    pub crop_inset_px: u32,

    /// Word-count ceiling for segmentation acceptance. Default: 100.
    ///
    /// A correctly cropped map contains labels, not running prose.
    pub max_words_segmented: usize,

    /// Word-count ceiling for the general extraction sanity check. Default: 200.
    pub max_words_extracted: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            workers: 5,
            detect_retries: 3,
            detect_backoff_ms: 2000,
            segment_attempts: 5,
            temperature: 0.5,
            embedded_threshold_fraction: 0.25,
            flattened_coverage: 0.8,
            min_red_pixels: 100,
            min_bbox_area: 1000,
            min_component_area: 10_000,
            closing_radius: 25,
            crop_inset_px: 5,
            max_words_segmented: 100,
            max_words_extracted: 200,
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn detect_retries(mut self, n: u32) -> Self {
        self.config.detect_retries = n;
        self
    }

    pub fn detect_backoff_ms(mut self, ms: u64) -> Self {
        self.config.detect_backoff_ms = ms;
        self
    }

    pub fn segment_attempts(mut self, n: u32) -> Self {
        self.config.segment_attempts = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn embedded_threshold_fraction(mut self, f: f32) -> Self {
        self.config.embedded_threshold_fraction = f;
        self
    }

    pub fn flattened_coverage(mut self, f: f32) -> Self {
        self.config.flattened_coverage = f;
        self
    }

    pub fn min_red_pixels(mut self, n: u64) -> Self {
        self.config.min_red_pixels = n;
        self
    }

    pub fn min_bbox_area(mut self, n: u64) -> Self {
        self.config.min_bbox_area = n;
        self
    }

    pub fn min_component_area(mut self, n: u64) -> Self {
        self.config.min_component_area = n;
        self
    }

    pub fn closing_radius(mut self, r: u8) -> Self {
        self.config.closing_radius = r;
        self
    }

    pub fn crop_inset_px(mut self, px: u32) -> Self {
        self.config.crop_inset_px = px;
        self
    }

    pub fn max_words_segmented(mut self, n: usize) -> Self {
        self.config.max_words_segmented = n;
        self
    }

    pub fn max_words_extracted(mut self, n: usize) -> Self {
        self.config.max_words_extracted = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.workers == 0 {
            return Err(ExtractError::InvalidConfig("workers must be >= 1".into()));
        }
        if !(c.embedded_threshold_fraction > 0.0 && c.embedded_threshold_fraction <= 1.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "embedded_threshold_fraction must be in (0, 1], got {}",
                c.embedded_threshold_fraction
            )));
        }
        if !(c.flattened_coverage > 0.0 && c.flattened_coverage <= 1.0) {
            return Err(ExtractError::InvalidConfig(format!(
                "flattened_coverage must be in (0, 1], got {}",
                c.flattened_coverage
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 150);
        assert_eq!(c.workers, 5);
        assert_eq!(c.segment_attempts, 5);
        assert_eq!(c.min_red_pixels, 100);
        assert_eq!(c.min_bbox_area, 1000);
        assert_eq!(c.min_component_area, 10_000);
        assert_eq!(c.max_words_segmented, 100);
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = ExtractionConfig::builder().dpi(9999).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn builder_rejects_bad_fraction() {
        let err = ExtractionConfig::builder()
            .embedded_threshold_fraction(1.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("embedded_threshold_fraction"));
    }

    #[test]
    fn builder_clamps_workers() {
        let c = ExtractionConfig::builder().workers(0).build().unwrap();
        assert_eq!(c.workers, 1);
    }
}
