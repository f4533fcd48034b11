//! Per-PDF driver: detection fan-out, extraction routing, manifest.
//!
//! ## Routing
//!
//! Every map-bearing page tries the cheap structural path first (pull the
//! dominant embedded raster), then falls back to the red-perimeter
//! segmentation loop. A "flattened" page — one scanned raster spanning the
//! whole page — skips the structural path entirely, since extracting the
//! lone embedded image would just return the whole page.
//!
//! ## Failure isolation
//!
//! A page whose both paths fail is logged and dropped from the manifest;
//! sibling pages are never cancelled. Only run-level problems (missing PDF,
//! unwritable output directory) abort the run.

use crate::capability::Capabilities;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{
    asset_filename, ExtractionOutput, ExtractionStats, MapManifest, MapMetadata, MapSource,
};
use crate::pipeline::{detect, embedded, encode, render, segment, validate};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Filename of the run manifest inside the output directory.
pub const MANIFEST_FILENAME: &str = "maps_metadata.json";

/// Extract every map asset from a PDF into `output_dir`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success — including runs where the PDF simply
/// contains zero maps or where some pages failed (check
/// `output.stats.pages_failed`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal problems: missing/corrupt
/// PDF, uncreatable output directory, unwritable manifest.
pub async fn extract_all(
    pdf_path: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    chapter: Option<&str>,
    caps: &Capabilities,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let output_dir = output_dir.as_ref();

    // ── Step 1: validate input, prepare output ───────────────────────────
    let pdf_path = render::validate_input(pdf_path.as_ref())?;
    info!("Starting map extraction: {}", pdf_path.display());

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ExtractError::OutputDirFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    // ── Step 2: rasterise all pages once ─────────────────────────────────
    let render_start = Instant::now();
    let pages = render::render_document(&pdf_path, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", pages.len(), render_duration_ms);

    // ── Steps 3–5: detect, route, collect ────────────────────────────────
    let (maps, pages_failed, maps_detected) =
        extract_from_pages(&pages, output_dir, chapter, caps, config).await;

    // ── Step 6: persist the manifest ─────────────────────────────────────
    let manifest = MapManifest::new(maps);
    write_manifest(output_dir, &manifest).await?;

    let stats = ExtractionStats {
        pages_scanned: pages.len(),
        maps_detected,
        maps_extracted: manifest
            .maps
            .iter()
            .filter(|m| m.source == MapSource::Extracted)
            .count(),
        maps_segmented: manifest
            .maps
            .iter()
            .filter(|m| m.source == MapSource::Segmented)
            .count(),
        pages_failed,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} maps ({} extracted, {} segmented, {} failed) in {}ms",
        manifest.total_maps,
        stats.maps_extracted,
        stats.maps_segmented,
        stats.pages_failed,
        stats.total_duration_ms
    );

    Ok(ExtractionOutput { manifest, stats })
}

/// Detection + routing over pre-rendered pages.
///
/// Public so integration tests can drive the whole orchestration with
/// synthetic [`render::PageAssets`] and stub capabilities, no PDF needed.
/// Returns `(metadata, failed_page_count, detected_map_count)`.
pub async fn extract_from_pages(
    pages: &[render::PageAssets],
    output_dir: &Path,
    chapter: Option<&str>,
    caps: &Capabilities,
    config: &ExtractionConfig,
) -> (Vec<MapMetadata>, usize, usize) {
    let detections = detect::detect_all(&caps.classifier, pages, config).await;

    let map_pages: Vec<(&render::PageAssets, detect::MapDetectionResult)> = pages
        .iter()
        .zip(detections)
        .filter(|(_, d)| d.has_map)
        .collect();
    let maps_detected = map_pages.len();
    info!(
        "{} of {} pages carry a map",
        maps_detected,
        pages.len()
    );

    let results: Vec<Option<MapMetadata>> = stream::iter(map_pages.into_iter().map(
        |(page, detection)| {
            let caps = caps.clone();
            let config = config.clone();
            let chapter = chapter.map(|s| s.to_string());
            async move {
                process_page(page, detection, output_dir, chapter, &caps, &config).await
            }
        },
    ))
    .buffer_unordered(config.workers)
    .collect()
    .await;

    let maps: Vec<MapMetadata> = results.into_iter().flatten().collect();
    let pages_failed = maps_detected - maps.len();
    (maps, pages_failed, maps_detected)
}

/// Route one map-bearing page through the extraction paths.
///
/// Returns `None` when both paths fail; the page is logged and dropped.
async fn process_page(
    page: &render::PageAssets,
    detection: detect::MapDetectionResult,
    output_dir: &Path,
    chapter: Option<String>,
    caps: &Capabilities,
    config: &ExtractionConfig,
) -> Option<MapMetadata> {
    // Both are Some whenever has_map is true; the detector enforces it.
    let map_type = detection.map_type?;
    let name = detection.name?;
    let page_num = page.page_num();
    let target = output_dir.join(asset_filename(page_num, &name));

    let metadata = |source: MapSource| MapMetadata {
        name: name.clone(),
        chapter: chapter.clone(),
        page_num,
        map_type,
        source,
    };

    // ── Fast path: structural extraction ─────────────────────────────────
    if embedded::is_flattened(page, config.flattened_coverage) {
        debug!(
            "Page {}: flattened page, skipping structural extraction",
            page_num
        );
    } else if let Some(bytes) = try_structural(page, &target, caps, config).await {
        info!(
            "Page {}: extracted embedded map ({} bytes) → {}",
            page_num,
            bytes,
            target.display()
        );
        return Some(metadata(MapSource::Extracted));
    }

    // ── Fallback: red-perimeter segmentation ─────────────────────────────
    let original = Arc::new(page.image.clone());
    match segment::segment(caps, original, page_num, &target, config).await {
        Ok(_) => Some(metadata(MapSource::Segmented)),
        Err(e) => {
            warn!("Page {}: could not be segmented — {}", page_num, e);
            None
        }
    }
}

/// Attempt the structural path; `None` means "fall through to segmentation".
///
/// Returns the persisted asset's byte count on success.
async fn try_structural(
    page: &render::PageAssets,
    target: &Path,
    caps: &Capabilities,
    config: &ExtractionConfig,
) -> Option<usize> {
    let candidate = embedded::largest_embedded(page, config.embedded_threshold_fraction)?;
    let (width, height) = (candidate.image.width(), candidate.image.height());

    let image = candidate.image.clone();
    let png = tokio::task::spawn_blocking(move || encode::encode_dynamic_png(&image))
        .await
        .ok()?
        .ok()?;

    if !embedded::plausible_map_dimensions(width, height, png.len()) {
        debug!(
            "Page {}: embedded image {}x{} ({} bytes) fails plausibility gate",
            page.page_num(),
            width,
            height,
            png.len()
        );
        return None;
    }

    // General sanity check, looser than the segmentation gate. Advisory:
    // an OCR failure passes, only a confident prose reading rejects.
    let (words, passed) =
        validate::check_word_count(&caps.reader, &png, config.max_words_extracted).await;
    if !passed {
        debug!(
            "Page {}: embedded image reads as prose ({} words), falling back",
            page.page_num(),
            words
        );
        return None;
    }

    match tokio::fs::write(target, &png).await {
        Ok(()) => Some(png.len()),
        Err(e) => {
            warn!(
                "Page {}: could not persist embedded map ({}), falling back",
                page.page_num(),
                e
            );
            None
        }
    }
}

/// Write `maps_metadata.json` atomically (temp file + rename).
async fn write_manifest(output_dir: &Path, manifest: &MapManifest) -> Result<(), ExtractError> {
    let path = output_dir.join(MANIFEST_FILENAME);
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| ExtractError::Internal(format!("manifest serialisation: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| ExtractError::ManifestWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| ExtractError::ManifestWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    debug!("Manifest written: {}", path.display());
    Ok(())
}
