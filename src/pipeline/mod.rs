//! Pipeline stages for map-asset extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ detect ──▶ { embedded | preprocess ─▶ paint ─▶ geometry } ─▶ validate
//! (pdfium)   (vision)    (fast path)  (red-perimeter fallback)            (OCR gate)
//! ```
//!
//! 1. [`render`]     — rasterise pages and harvest embedded rasters; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`]     — PNG-encode images for capability payloads and disk
//! 3. [`detect`]     — per-page vision classification with ordered fan-out
//! 4. [`embedded`]   — structural fast path over a page's embedded images
//! 5. [`preprocess`] — strip pre-existing red before perimeter drawing
//! 6. [`geometry`]   — pure pixel-space perimeter recovery and rescaling
//! 7. [`segment`]    — the bounded-retry red-perimeter loop
//! 8. [`validate`]   — advisory OCR word-count gate on accepted crops

pub mod detect;
pub mod embedded;
pub mod encode;
pub mod geometry;
pub mod preprocess;
pub mod render;
pub mod segment;
pub mod validate;
