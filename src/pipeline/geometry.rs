//! Red-perimeter geometry: pure pixel-space analysis of generated images.
//!
//! Everything here is synchronous and allocation-bound — no I/O, no
//! capability calls, no knowledge of where an image came from. The
//! segmentation stage offloads these routines to `spawn_blocking`; unit
//! tests drive them directly on synthetic pixel buffers.
//!
//! ## Two operations, deliberately not unified
//!
//! [`bounding_box`] computes the min/max extent of *all* red pixels with no
//! labelling — the right semantics when a single drawn perimeter is
//! expected, as in the segmentation loop.
//!
//! [`find_regions`] handles the general case of multiple disjoint red
//! regions: morphological closing fuses the four disconnected edges of a
//! hand-drawn rectangle into one blob, 8-connected component labelling
//! separates distinct blobs, and a pixel-count floor discards compression
//! noise. Candidates rank by bounding-box area; `pixel_area` stays the raw
//! component pixel count, which is a different number and must not be
//! conflated with the rectangle's area.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

/// The canonical "very red" predicate: R>200, G<50, B<50, strict.
///
/// One predicate serves preprocessing, detection, and validation. The
/// thresholds are lenient about hue on purpose — JPEG-style artefacts from
/// the generation capability smear pure red into neighbouring values.
pub fn is_red(pixel: &Rgb<u8>) -> bool {
    pixel[0] > 200 && pixel[1] < 50 && pixel[2] < 50
}

/// Count pixels satisfying [`is_red`].
pub fn count_red(image: &RgbImage) -> u64 {
    image.pixels().filter(|p| is_red(p)).count() as u64
}

/// An axis-aligned rectangle in pixel coordinates, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Area of the bounding rectangle (not the component pixel count).
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// One connected red region found by [`find_regions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRegion {
    /// Bounding rectangle of the component; this is what gets cropped.
    pub bounds: Region,
    /// Pixel count of the connected component, post-closing. Used only as
    /// the noise floor; ranking uses `bounds.area()`.
    pub pixel_area: u64,
}

/// Bounding box of all red pixels combined, with no labelling.
///
/// Returns `None` when the image contains no red pixels at all.
pub fn bounding_box(image: &RgbImage) -> Option<Region> {
    let mut bounds: Option<Region> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if !is_red(pixel) {
            continue;
        }
        bounds = Some(match bounds {
            None => Region {
                x_min: x,
                y_min: y,
                x_max: x,
                y_max: y,
            },
            Some(b) => Region {
                x_min: b.x_min.min(x),
                y_min: b.y_min.min(y),
                x_max: b.x_max.max(x),
                y_max: b.y_max.max(y),
            },
        });
    }
    bounds
}

/// Binary mask of red pixels: 255 where [`is_red`], 0 elsewhere.
fn red_mask(image: &RgbImage) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        if is_red(pixel) {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}

/// Locate disjoint red regions, largest bounding box first.
///
/// `closing_radius` sets the structuring element for morphological closing
/// (a radius of 25 gives a 51×51 square); `min_component_area` is the pixel
/// count below which a component is discarded as noise.
///
/// Returns an empty vector when no red pixels survive the floor.
pub fn find_regions(
    image: &RgbImage,
    closing_radius: u8,
    min_component_area: u64,
) -> Vec<CandidateRegion> {
    let mask = red_mask(image);
    let closed = close(&mask, Norm::LInf, closing_radius);
    let labels = connected_components(&closed, Connectivity::Eight, Luma([0u8]));

    // Accumulate per-label pixel count and bounding box in one pass.
    let mut components: HashMap<u32, CandidateRegion> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label[0];
        if id == 0 {
            continue; // background
        }
        components
            .entry(id)
            .and_modify(|c| {
                c.pixel_area += 1;
                c.bounds.x_min = c.bounds.x_min.min(x);
                c.bounds.y_min = c.bounds.y_min.min(y);
                c.bounds.x_max = c.bounds.x_max.max(x);
                c.bounds.y_max = c.bounds.y_max.max(y);
            })
            .or_insert(CandidateRegion {
                bounds: Region {
                    x_min: x,
                    y_min: y,
                    x_max: x,
                    y_max: y,
                },
                pixel_area: 1,
            });
    }

    let mut regions: Vec<CandidateRegion> = components
        .into_values()
        .filter(|c| c.pixel_area >= min_component_area)
        .collect();
    regions.sort_by(|a, b| b.bounds.area().cmp(&a.bounds.area()));
    regions
}

/// Rescale a region from generated-image space to original-page space.
///
/// Scale factors are independent per axis because the generation capability
/// may change aspect ratio when it resizes. `inset_px` (given at generated
/// scale) is scaled by the larger factor and applied inward on all four
/// sides so the crop lands inside the drawn border line; the result is
/// clamped to the original image bounds.
pub fn rescale_region(
    region: &Region,
    generated_dims: (u32, u32),
    original_dims: (u32, u32),
    inset_px: u32,
) -> Region {
    let (gen_w, gen_h) = generated_dims;
    let (orig_w, orig_h) = original_dims;
    let scale_x = orig_w as f64 / gen_w.max(1) as f64;
    let scale_y = orig_h as f64 / gen_h.max(1) as f64;
    let inset = (inset_px as f64 * scale_x.max(scale_y)).round();

    let x_min = (region.x_min as f64 * scale_x + inset).round().max(0.0) as u32;
    let y_min = (region.y_min as f64 * scale_y + inset).round().max(0.0) as u32;
    let x_max = ((region.x_max as f64 * scale_x - inset).round() as i64)
        .clamp(0, orig_w.saturating_sub(1) as i64) as u32;
    let y_max = ((region.y_max as f64 * scale_y - inset).round() as i64)
        .clamp(0, orig_h.saturating_sub(1) as i64) as u32;

    // Degenerate insets (tiny region, large inset) collapse to the midline
    // rather than producing an inverted rectangle.
    Region {
        x_min: x_min.min(x_max),
        y_min: y_min.min(y_max),
        x_max: x_max.max(x_min),
        y_max: y_max.max(y_min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn canvas(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, WHITE)
    }

    fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn red_predicate_is_strict_at_the_boundary() {
        // Exactly at the thresholds: NOT red.
        assert!(!is_red(&Rgb([200, 50, 50])));
        // One past each threshold: red.
        assert!(is_red(&Rgb([201, 49, 49])));
        assert!(is_red(&Rgb([255, 0, 0])));
        assert!(!is_red(&Rgb([255, 50, 0])));
        assert!(!is_red(&Rgb([255, 0, 50])));
    }

    #[test]
    fn bounding_box_of_filled_rectangle() {
        let mut img = canvas(100, 100);
        fill_rect(&mut img, 25, 25, 75, 75, RED);

        let b = bounding_box(&img).expect("red pixels present");
        assert_eq!(b.x_min, 25);
        assert_eq!(b.y_min, 25);
        assert_eq!(b.x_max, 74);
        assert_eq!(b.y_max, 74);
        assert_eq!(b.width(), 50);
        assert_eq!(b.area(), 2500);
    }

    #[test]
    fn bounding_box_none_without_red() {
        let img = canvas(50, 50);
        assert_eq!(bounding_box(&img), None);
    }

    #[test]
    fn count_red_counts_exactly() {
        let mut img = canvas(20, 20);
        fill_rect(&mut img, 0, 0, 5, 5, RED);
        assert_eq!(count_red(&img), 25);
    }

    #[test]
    fn find_regions_single_filled_rectangle() {
        let mut img = canvas(100, 100);
        fill_rect(&mut img, 25, 25, 75, 75, RED);

        let regions = find_regions(&img, 5, 100);
        assert_eq!(regions.len(), 1);
        let b = regions[0].bounds;
        assert!(b.x_min.abs_diff(25) <= 1, "x_min={}", b.x_min);
        assert!(b.y_min.abs_diff(25) <= 1, "y_min={}", b.y_min);
        assert!(b.x_max.abs_diff(74) <= 1, "x_max={}", b.x_max);
        assert!(b.y_max.abs_diff(74) <= 1, "y_max={}", b.y_max);
        assert_eq!(regions[0].pixel_area, 2500);
    }

    #[test]
    fn find_regions_fuses_hollow_border_into_one_component() {
        // A 4px-thick hollow rectangle: four strokes, one drawn perimeter.
        let mut img = canvas(200, 200);
        fill_rect(&mut img, 40, 40, 160, 44, RED); // top
        fill_rect(&mut img, 40, 156, 160, 160, RED); // bottom
        fill_rect(&mut img, 40, 44, 44, 156, RED); // left
        fill_rect(&mut img, 156, 44, 160, 156, RED); // right

        let regions = find_regions(&img, 25, 100);
        assert_eq!(regions.len(), 1, "edges must fuse into one component");
        let b = regions[0].bounds;
        assert!(b.x_min <= 40 && b.x_max >= 159);
        assert!(b.y_min <= 40 && b.y_max >= 159);
    }

    #[test]
    fn find_regions_rejects_noise_below_floor() {
        let mut img = canvas(400, 400);
        fill_rect(&mut img, 50, 50, 250, 250, RED); // 40 000 px, keeps
        fill_rect(&mut img, 340, 340, 360, 360, RED); // 400 px, noise

        let regions = find_regions(&img, 2, 10_000);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].pixel_area >= 10_000);
        assert_eq!(regions[0].bounds.x_min, 50);
    }

    #[test]
    fn find_regions_orders_by_bbox_area() {
        let mut img = canvas(400, 400);
        fill_rect(&mut img, 10, 10, 60, 60, RED); // 50×50
        fill_rect(&mut img, 200, 200, 350, 350, RED); // 150×150

        let regions = find_regions(&img, 2, 100);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].bounds.area() > regions[1].bounds.area());
        assert_eq!(regions[0].bounds.x_min, 200);
    }

    #[test]
    fn find_regions_empty_image() {
        let img = canvas(64, 64);
        assert!(find_regions(&img, 25, 10_000).is_empty());
    }

    #[test]
    fn rescale_doubles_coordinates_at_half_resolution() {
        let region = Region {
            x_min: 10,
            y_min: 10,
            x_max: 50,
            y_max: 50,
        };
        let scaled = rescale_region(&region, (100, 100), (200, 200), 0);
        assert_eq!(scaled.x_min, 20);
        assert_eq!(scaled.y_min, 20);
        assert_eq!(scaled.x_max, 100);
        assert_eq!(scaled.y_max, 100);
    }

    #[test]
    fn rescale_is_independent_per_axis() {
        let region = Region {
            x_min: 10,
            y_min: 10,
            x_max: 90,
            y_max: 90,
        };
        // Width triples, height stays.
        let scaled = rescale_region(&region, (100, 100), (300, 100), 0);
        assert_eq!(scaled.x_min, 30);
        assert_eq!(scaled.x_max, 270);
        assert_eq!(scaled.y_min, 10);
        assert_eq!(scaled.y_max, 90);
    }

    #[test]
    fn rescale_applies_scaled_inset() {
        let region = Region {
            x_min: 10,
            y_min: 10,
            x_max: 90,
            y_max: 90,
        };
        // 2× scale, 5px inset at generated scale → 10px at original scale.
        let scaled = rescale_region(&region, (100, 100), (200, 200), 5);
        assert_eq!(scaled.x_min, 30);
        assert_eq!(scaled.y_min, 30);
        assert_eq!(scaled.x_max, 170);
        assert_eq!(scaled.y_max, 170);
    }

    #[test]
    fn rescale_clamps_to_image_bounds() {
        let region = Region {
            x_min: 0,
            y_min: 0,
            x_max: 99,
            y_max: 99,
        };
        let scaled = rescale_region(&region, (100, 100), (200, 200), 0);
        assert!(scaled.x_max <= 199);
        assert!(scaled.y_max <= 199);
    }
}
