//! Structural extraction: pull maps straight out of a page's embedded rasters.
//!
//! Many modules place each map on the page as a separate embedded image.
//! When that's the case, no AI is needed at all — just pick the dominant
//! embedded raster and save it at native resolution, which is usually higher
//! than anything a re-render could produce. This is the fast path; the
//! segmentation loop is the fallback for maps baked into the page.
//!
//! All functions here are pure over [`PageAssets`]; pdfium access happened
//! at render time.

use crate::pipeline::render::{EmbeddedImage, PageAssets};

/// Minimum plausible file size for a real map asset.
pub const MIN_ASSET_BYTES: usize = 50 * 1024;

/// Plausible pixel bounds for a map image (exclusive).
///
/// Below the floors it's an icon or decoration; above the ceilings — or in
/// the 1600×2000+ corner — it's almost certainly a full page scan
/// masquerading as a map.
pub const WIDTH_RANGE: (u32, u32) = (500, 3500);
pub const HEIGHT_RANGE: (u32, u32) = (400, 2500);
const WHOLE_PAGE_GUARD: (u32, u32) = (1600, 2000);

/// Fraction of the rendered page one embedded image covers.
///
/// Embedded rasters are compared at their native resolution against the
/// rendered page size, so coverage can exceed 1.0 for high-DPI scans.
pub fn coverage(page: &PageAssets, embedded: &EmbeddedImage) -> f64 {
    embedded.pixel_area() as f64 / page.pixel_area().max(1) as f64
}

/// Flattened-page heuristic: one embedded raster that IS the page.
///
/// Structural extraction on such a page would return the whole page, which
/// is never a correct map crop, so the orchestrator routes it straight to
/// segmentation.
pub fn is_flattened(page: &PageAssets, flattened_coverage: f32) -> bool {
    page.embedded.len() == 1 && coverage(page, &page.embedded[0]) > flattened_coverage as f64
}

/// Select the page's dominant embedded image, if any clears the threshold.
///
/// Candidates must cover at least `threshold_fraction` of the page; among
/// those, the one with the largest native pixel area wins. `None` is the
/// normal control-flow signal to fall through to segmentation.
pub fn largest_embedded(page: &PageAssets, threshold_fraction: f32) -> Option<&EmbeddedImage> {
    page.embedded
        .iter()
        .filter(|e| coverage(page, e) >= threshold_fraction as f64)
        .max_by_key(|e| e.pixel_area())
}

/// Sanity-check an extracted asset before accepting it as done.
///
/// `largest_embedded` only applies an area threshold; this gate rejects
/// thumbnails, undersized crops, and whole-page scans by size and shape.
pub fn plausible_map_dimensions(width: u32, height: u32, byte_len: usize) -> bool {
    if byte_len <= MIN_ASSET_BYTES {
        return false;
    }
    if width <= WIDTH_RANGE.0 || width >= WIDTH_RANGE.1 {
        return false;
    }
    if height <= HEIGHT_RANGE.0 || height >= HEIGHT_RANGE.1 {
        return false;
    }
    // Large in both dimensions at once reads as "the whole page".
    !(width > WHOLE_PAGE_GUARD.0 && height > WHOLE_PAGE_GUARD.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn page_with_embedded(page_dims: (u32, u32), embedded_dims: &[(u32, u32)]) -> PageAssets {
        PageAssets {
            index: 0,
            image: RgbImage::new(page_dims.0, page_dims.1),
            embedded: embedded_dims
                .iter()
                .map(|&(w, h)| EmbeddedImage {
                    image: DynamicImage::ImageRgb8(RgbImage::new(w, h)),
                })
                .collect(),
        }
    }

    #[test]
    fn flattened_page_detected() {
        let page = page_with_embedded((1000, 1400), &[(950, 1350)]);
        assert!(is_flattened(&page, 0.8));
    }

    #[test]
    fn two_images_never_flattened() {
        // Even if one covers the page, two embedded rasters means composed
        // content, not a scan.
        let page = page_with_embedded((1000, 1400), &[(950, 1350), (100, 100)]);
        assert!(!is_flattened(&page, 0.8));
    }

    #[test]
    fn small_single_image_not_flattened() {
        let page = page_with_embedded((1000, 1400), &[(400, 300)]);
        assert!(!is_flattened(&page, 0.8));
    }

    #[test]
    fn largest_embedded_respects_threshold() {
        // Page is 1000×1000 = 1M px; threshold 0.25 → 250k px floor.
        let page = page_with_embedded((1000, 1000), &[(300, 300), (600, 600), (700, 500)]);
        let chosen = largest_embedded(&page, 0.25).expect("two candidates clear the bar");
        assert_eq!(chosen.image.width(), 600); // 360k beats 350k
    }

    #[test]
    fn largest_embedded_none_below_threshold() {
        let page = page_with_embedded((1000, 1000), &[(300, 300), (200, 400)]);
        assert!(largest_embedded(&page, 0.25).is_none());
    }

    #[test]
    fn largest_embedded_none_without_images() {
        let page = page_with_embedded((1000, 1000), &[]);
        assert!(largest_embedded(&page, 0.25).is_none());
    }

    #[test]
    fn plausible_dimensions_happy_path() {
        assert!(plausible_map_dimensions(1200, 900, 200 * 1024));
    }

    #[test]
    fn plausible_dimensions_rejects_small_file() {
        assert!(!plausible_map_dimensions(1200, 900, 10 * 1024));
    }

    #[test]
    fn plausible_dimensions_rejects_out_of_range() {
        assert!(!plausible_map_dimensions(400, 900, 200 * 1024)); // too narrow
        assert!(!plausible_map_dimensions(3600, 900, 200 * 1024)); // too wide
        assert!(!plausible_map_dimensions(1200, 300, 200 * 1024)); // too short
        assert!(!plausible_map_dimensions(1200, 2600, 200 * 1024)); // too tall
    }

    #[test]
    fn plausible_dimensions_rejects_whole_page_shape() {
        // In range on both axes, but big in both at once.
        assert!(!plausible_map_dimensions(1700, 2100, 400 * 1024));
        // Big in only one dimension is fine.
        assert!(plausible_map_dimensions(1700, 1200, 400 * 1024));
    }
}
