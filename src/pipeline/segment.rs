//! Segmentation: recover a map crop via the red-perimeter technique.
//!
//! The page is preprocessed to remove any pre-existing red, handed to the
//! image-generation capability with instructions to draw a tight red border
//! around the map, and the drawn border is recovered with classical pixel
//! geometry. The crop coordinates come from the *generated* image but are
//! applied to the *original* render — that is the whole point of the
//! technique: the generated image may be resized, recompressed, or subtly
//! repainted, while the original keeps full source fidelity.
//!
//! ## Retry semantics
//!
//! Any step after the generation call can fail — no image returned, no
//! usable perimeter, crop full of prose — and every failure triggers a full
//! retry with a fresh generation call. There is no partial retry of just the
//! geometry, because the drawn perimeter itself may have been wrong.
//! Intermediate artifacts from every attempt are persisted under `temp/`
//! for post-hoc debugging.

use crate::capability::Capabilities;
use crate::config::ExtractionConfig;
use crate::error::SegmentationError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::geometry::{bounding_box, count_red, rescale_region};
use crate::pipeline::preprocess::remove_red;
use crate::prompts::PERIMETER_INSTRUCTION;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Paths for one page's diagnostic intermediates.
struct Diagnostics {
    preprocessed: PathBuf,
    with_perimeter: PathBuf,
}

impl Diagnostics {
    /// Derive diagnostic paths from the target crop path: siblings under a
    /// `temp/` subdirectory, named by suffixing the target's stem.
    fn for_target(target: &Path) -> Self {
        let dir = target
            .parent()
            .map(|p| p.join("temp"))
            .unwrap_or_else(|| PathBuf::from("temp"));
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        Self {
            preprocessed: dir.join(format!("{stem}_preprocessed.png")),
            with_perimeter: dir.join(format!("{stem}_with_red_perimeter.png")),
        }
    }
}

/// Write a diagnostic intermediate; failure is logged, never fatal.
async fn persist_diagnostic(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Could not create diagnostics dir {}: {}", parent.display(), e);
            return;
        }
    }
    if let Err(e) = tokio::fs::write(path, bytes).await {
        warn!("Could not write diagnostic {}: {}", path.display(), e);
    }
}

/// Segment the map out of `original`, writing the crop to `target_path`.
///
/// Returns the PNG bytes of the accepted crop, or
/// [`SegmentationError::RetriesExhausted`] once the attempt budget is spent.
pub async fn segment(
    caps: &Capabilities,
    original: Arc<RgbImage>,
    page_num: usize,
    target_path: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<u8>, SegmentationError> {
    let diagnostics = Diagnostics::for_target(target_path);
    let mut last_err: Option<SegmentationError> = None;

    for attempt in 1..=config.segment_attempts {
        debug!(
            "Page {}: segmentation attempt {}/{}",
            page_num, attempt, config.segment_attempts
        );

        match segment_attempt(caps, &original, &diagnostics, config).await {
            Ok(crop_png) => {
                if let Some(parent) = target_path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| SegmentationError::Io(e.to_string()))?;
                }
                tokio::fs::write(target_path, &crop_png)
                    .await
                    .map_err(|e| SegmentationError::Io(e.to_string()))?;

                info!(
                    "Page {}: segmented on attempt {}/{} → {}",
                    page_num,
                    attempt,
                    config.segment_attempts,
                    target_path.display()
                );
                return Ok(crop_png);
            }
            Err(e) => {
                info!(
                    "Page {}: attempt {}/{} failed — {}",
                    page_num, attempt, config.segment_attempts, e
                );
                last_err = Some(e);
            }
        }
    }

    Err(SegmentationError::RetriesExhausted {
        attempts: config.segment_attempts,
        last: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

/// One attempt: preprocess → generate → locate → rescale → crop → validate.
async fn segment_attempt(
    caps: &Capabilities,
    original: &Arc<RgbImage>,
    diagnostics: &Diagnostics,
    config: &ExtractionConfig,
) -> Result<Vec<u8>, SegmentationError> {
    // ── Step 1: strip pre-existing red, off the async thread ─────────────
    let source = Arc::clone(original);
    let preprocessed_png = tokio::task::spawn_blocking(move || {
        let cleaned = remove_red(&source);
        encode_png(&cleaned)
    })
    .await
    .map_err(|e| SegmentationError::Io(format!("preprocess task panicked: {e}")))?
    .map_err(|e| SegmentationError::Io(format!("encode preprocessed: {e}")))?;

    persist_diagnostic(&diagnostics.preprocessed, &preprocessed_png).await;

    // ── Step 2: ask the capability to draw the perimeter ─────────────────
    let generated_png = caps
        .painter
        .paint(&preprocessed_png, PERIMETER_INSTRUCTION, config.temperature)
        .await
        .map_err(|e| SegmentationError::Capability(e.to_string()))?;

    if generated_png.is_empty() {
        return Err(SegmentationError::NoImageReturned);
    }

    persist_diagnostic(&diagnostics.with_perimeter, &generated_png).await;

    // ── Steps 3–5: geometry on the generated image, crop of the original ─
    let source = Arc::clone(original);
    let min_red = config.min_red_pixels;
    let min_area = config.min_bbox_area;
    let inset = config.crop_inset_px;
    let crop_png = tokio::task::spawn_blocking(move || {
        crop_from_generated(&source, &generated_png, min_red, min_area, inset)
    })
    .await
    .map_err(|e| SegmentationError::Io(format!("geometry task panicked: {e}")))??;

    // ── Step 6: advisory OCR gate ────────────────────────────────────────
    let (words, passed) =
        super::validate::check_word_count(&caps.reader, &crop_png, config.max_words_segmented)
            .await;
    if !passed {
        return Err(SegmentationError::TooMuchText {
            words,
            max: config.max_words_segmented,
        });
    }

    Ok(crop_png)
}

/// Synchronous geometry core: locate the perimeter in the generated image
/// and cut the corresponding rectangle out of the original.
fn crop_from_generated(
    original: &RgbImage,
    generated_png: &[u8],
    min_red_pixels: u64,
    min_bbox_area: u64,
    inset_px: u32,
) -> Result<Vec<u8>, SegmentationError> {
    let generated = image::load_from_memory(generated_png)
        .map_err(|e| SegmentationError::BadGeneratedImage(e.to_string()))?
        .to_rgb8();

    let red_pixels = count_red(&generated);
    if red_pixels < min_red_pixels {
        return Err(SegmentationError::PerimeterNotFound {
            red_pixels,
            min: min_red_pixels,
        });
    }

    // Single-perimeter expectation: the simple bounding-box path, no labelling.
    let region = bounding_box(&generated).ok_or(SegmentationError::PerimeterNotFound {
        red_pixels,
        min: min_red_pixels,
    })?;

    if region.area() < min_bbox_area {
        return Err(SegmentationError::RegionTooSmall {
            area: region.area(),
            min: min_bbox_area,
        });
    }

    let scaled = rescale_region(
        &region,
        (generated.width(), generated.height()),
        (original.width(), original.height()),
        inset_px,
    );

    debug!(
        "perimeter {}x{} in generated space → crop {}x{} at ({}, {}) in original space",
        region.width(),
        region.height(),
        scaled.width(),
        scaled.height(),
        scaled.x_min,
        scaled.y_min
    );

    let crop = image::imageops::crop_imm(
        original,
        scaled.x_min,
        scaled.y_min,
        scaled.width(),
        scaled.height(),
    )
    .to_image();

    encode_png(&crop).map_err(|e| SegmentationError::Io(format!("encode crop: {e}")))
}
