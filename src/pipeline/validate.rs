//! Quality validation: independent acceptance checks on extracted crops.
//!
//! ## Word count is advisory
//!
//! OCR is an optional quality signal, not a hard gate. A failing OCR call
//! (network error, capability down) must never block an otherwise-good
//! extraction, so [`check_word_count`] swallows capability errors and
//! reports `passed = true` in that case. Only a *successful* reading with
//! too many words rejects the crop — that means the perimeter captured a
//! prose column, the single most common segmentation failure mode.

use crate::capability::TextReader;
use std::sync::Arc;
use tracing::{debug, warn};

/// OCR the crop and count whitespace-delimited tokens.
///
/// Returns `(word_count, passed)` with `passed = word_count <= max_words`.
/// A capability failure is treated as "assume valid": `(0, true)`.
pub async fn check_word_count(
    reader: &Arc<dyn TextReader>,
    crop_png: &[u8],
    max_words: usize,
) -> (usize, bool) {
    let text = match reader.read_text(crop_png).await {
        Ok(text) => text,
        Err(e) => {
            warn!("OCR failed, assuming crop is valid: {}", e);
            return (0, true);
        }
    };

    let words = text.split_whitespace().count();
    debug!("OCR word count: {} (max {})", words, max_words);
    (words, words <= max_words)
}

/// Compare extracted dimensions against a reference within a per-axis
/// tolerance (0.2 = ±20%).
///
/// Used only when a ground-truth image exists (benchmarking). This is a
/// different notion of quality from the word-count check and the two are
/// never combined.
pub fn dimensions_within_tolerance(
    extracted: (u32, u32),
    reference: (u32, u32),
    tolerance: f32,
) -> bool {
    fn axis_ok(a: u32, b: u32, tol: f32) -> bool {
        if b == 0 {
            return a == 0;
        }
        let ratio = a as f32 / b as f32;
        (1.0 - tol..=1.0 + tol).contains(&ratio)
    }
    axis_ok(extracted.0, reference.0, tolerance) && axis_ok(extracted.1, reference.1, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use async_trait::async_trait;

    struct FixedReader(Result<String, CapabilityError>);

    #[async_trait]
    impl TextReader for FixedReader {
        async fn read_text(&self, _png: &[u8]) -> Result<String, CapabilityError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn short_text_passes() {
        let reader: Arc<dyn TextReader> =
            Arc::new(FixedReader(Ok("Room 1 Room 2 Stairs".into())));
        let (words, passed) = check_word_count(&reader, b"png", 100).await;
        assert_eq!(words, 5);
        assert!(passed);
    }

    #[tokio::test]
    async fn prose_fails() {
        let prose = "word ".repeat(150);
        let reader: Arc<dyn TextReader> = Arc::new(FixedReader(Ok(prose)));
        let (words, passed) = check_word_count(&reader, b"png", 100).await;
        assert_eq!(words, 150);
        assert!(!passed);
    }

    #[tokio::test]
    async fn exact_limit_passes() {
        let text = "w ".repeat(100);
        let reader: Arc<dyn TextReader> = Arc::new(FixedReader(Ok(text)));
        let (words, passed) = check_word_count(&reader, b"png", 100).await;
        assert_eq!(words, 100);
        assert!(passed);
    }

    #[tokio::test]
    async fn ocr_failure_assumes_valid() {
        let reader: Arc<dyn TextReader> =
            Arc::new(FixedReader(Err(CapabilityError::Api("ocr down".into()))));
        let (words, passed) = check_word_count(&reader, b"png", 100).await;
        assert_eq!(words, 0);
        assert!(passed, "OCR failure must never reject a crop");
    }

    #[test]
    fn dimension_tolerance() {
        assert!(dimensions_within_tolerance((1000, 800), (1000, 800), 0.2));
        assert!(dimensions_within_tolerance((1100, 700), (1000, 800), 0.2));
        assert!(!dimensions_within_tolerance((1300, 800), (1000, 800), 0.2));
        assert!(!dimensions_within_tolerance((1000, 500), (1000, 800), 0.2));
    }
}
