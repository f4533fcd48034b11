//! Pixel preprocessing: strip pre-existing red before perimeter drawing.
//!
//! Adventure-module pages use red freely (dragon art, warning boxes, ornate
//! chapter numerals). Any pixel already satisfying the detection predicate
//! would later be indistinguishable from the perimeter the model draws, so
//! the segmentation stage blanks them all to black first. The predicate is
//! [`crate::pipeline::geometry::is_red`] — the *same* one detection uses,
//! which guarantees no false carryover: a pixel that survives preprocessing
//! cannot trip detection.

use crate::pipeline::geometry::is_red;
use image::{Rgb, RgbImage};

/// Return a copy of `image` with every red pixel replaced by pure black.
///
/// Pure function over pixel data: the input is never mutated, and an image
/// with zero red pixels comes back value-identical.
pub fn remove_red(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        if is_red(pixel) {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_pixels_become_black() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        img.put_pixel(1, 1, Rgb([255, 0, 0]));
        img.put_pixel(2, 2, Rgb([220, 30, 10]));

        let cleaned = remove_red(&img);
        assert_eq!(*cleaned.get_pixel(1, 1), Rgb([0, 0, 0]));
        assert_eq!(*cleaned.get_pixel(2, 2), Rgb([0, 0, 0]));
        assert_eq!(*cleaned.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn image_without_red_is_unchanged() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([180, 180, 180]));
        // Boundary-value pixel: exactly at the thresholds, must survive.
        img.put_pixel(3, 3, Rgb([200, 50, 50]));

        let cleaned = remove_red(&img);
        assert_eq!(cleaned, img);
    }

    #[test]
    fn input_is_not_mutated() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let before = img.clone();

        let _ = remove_red(&img);
        assert_eq!(img, before);
    }
}
