//! Error types for the pdf2maps library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot proceed at all (missing
//!   input PDF, output directory not creatable, no capability backend
//!   configured). Returned as `Err(ExtractError)` from the top-level
//!   `extract_all` entry point; the CLI maps it to a nonzero exit code.
//!
//! * [`SegmentationError`] — **Non-fatal**: a single page's extraction
//!   attempt failed (the model drew no usable perimeter, the crop was mostly
//!   prose, a capability call errored out). The segmentation loop retries
//!   these, and on exhaustion the orchestrator logs the page and drops it
//!   from the manifest. Sibling pages are unaffected.
//!
//! The separation keeps the contract simple: a run that fails to extract some
//! maps still completes with a partial manifest; only a structurally invalid
//! run terminates the process.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2maps library.
///
/// Page-level failures use [`SegmentationError`] and are logged and dropped
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The document rendered to zero pages.
    #[error("PDF '{path}' contains no pages")]
    EmptyDocument { path: PathBuf },

    // ── Capability errors ─────────────────────────────────────────────────
    /// No vision backend could be resolved (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output or diagnostics directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the run manifest.
    #[error("Failed to write manifest '{path}': {source}")]
    ManifestWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_DYNAMIC_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal, per-attempt failure inside the segmentation pipeline.
///
/// Every variant is retryable: the only remedy for a bad perimeter is to
/// re-roll the generation call, so the retry loop treats validation failures
/// and transient capability failures identically. [`RetriesExhausted`] is the
/// terminal variant the orchestrator sees when the attempt budget runs out.
///
/// [`RetriesExhausted`]: SegmentationError::RetriesExhausted
#[derive(Debug, Clone, Error)]
pub enum SegmentationError {
    /// The generation capability returned no image at all.
    #[error("capability response contained no image")]
    NoImageReturned,

    /// The returned bytes could not be decoded as an image.
    #[error("generated image could not be decoded: {0}")]
    BadGeneratedImage(String),

    /// Too few red pixels to believe a perimeter was drawn.
    #[error("no usable perimeter: {red_pixels} red pixels (need >= {min})")]
    PerimeterNotFound { red_pixels: u64, min: u64 },

    /// The detected bounding box is too small to be a map.
    #[error("bounding box too small: {area}px\u{00b2} (need >= {min})")]
    RegionTooSmall { area: u64, min: u64 },

    /// OCR found more running text than a map crop should contain.
    #[error("crop looks like prose: {words} words (max {max})")]
    TooMuchText { words: usize, max: usize },

    /// A capability call (generation, OCR) failed.
    #[error("capability call failed: {0}")]
    Capability(String),

    /// Writing a crop or diagnostic intermediate failed.
    #[error("failed to persist segmentation artifact: {0}")]
    Io(String),

    /// The attempt budget is spent; carries the last attempt's failure.
    #[error("segmentation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = ExtractError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(e.to_string().contains("missing.pdf"));
    }

    #[test]
    fn perimeter_not_found_display() {
        let e = SegmentationError::PerimeterNotFound {
            red_pixels: 12,
            min: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("12"), "got: {msg}");
        assert!(msg.contains("100"), "got: {msg}");
    }

    #[test]
    fn retries_exhausted_display() {
        let e = SegmentationError::RetriesExhausted {
            attempts: 5,
            last: "bounding box too small".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("5 attempts"), "got: {msg}");
        assert!(msg.contains("bounding box too small"), "got: {msg}");
    }

    #[test]
    fn too_much_text_display() {
        let e = SegmentationError::TooMuchText {
            words: 240,
            max: 100,
        };
        assert!(e.to_string().contains("240 words"));
    }
}
