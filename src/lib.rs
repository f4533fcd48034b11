//! # pdf2maps
//!
//! Extract map artwork from PDF adventure modules using vision models.
//!
//! ## Why this crate?
//!
//! Adventure-module maps are rarely clean embedded resources. Some are —
//! and those can be pulled out of the page's raster table directly, at full
//! native resolution. But many are baked into a flattened page scan,
//! surrounded by prose, sidebars, and decoration, where no structural
//! extraction can find them. This crate handles both: a structural fast
//! path, and a *red-perimeter* fallback where an image model is asked to
//! draw a tight red border around the map and classical pixel geometry
//! (thresholding, morphological closing, connected components) recovers the
//! crop rectangle from the drawing — applied to the undistorted original.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render    rasterise pages + harvest embedded rasters (pdfium, spawn_blocking)
//!  ├─ 2. Detect    vision classification per page, concurrent, page-ordered
//!  ├─ 3. Extract   structural fast path: dominant embedded raster
//!  ├─ 4. Segment   fallback: red perimeter → mask → bbox → rescaled crop
//!  ├─ 5. Validate  red-pixel floor, area floor, advisory OCR word count
//!  └─ 6. Manifest  maps_metadata.json + one PNG per map
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2maps::{extract_all, Capabilities, ExtractionConfig};
//! use pdf2maps::capability::llm::{resolve_provider, LlmClassifier, LlmTextReader};
//! use pdf2maps::capability::paint::HttpPerimeterPainter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = resolve_provider(None, None)?;
//!     let caps = Capabilities::new(
//!         Arc::new(LlmClassifier::new(provider.clone())),
//!         Arc::new(HttpPerimeterPainter::new(
//!             "https://api.openai.com/v1/images/edits",
//!             "gpt-image-1",
//!             std::env::var("OPENAI_API_KEY").ok(),
//!         )?),
//!         Arc::new(LlmTextReader::new(provider)),
//!     );
//!     let config = ExtractionConfig::default();
//!     let output = extract_all("module.pdf", "map_assets", Some("ch1"), &caps, &config).await?;
//!     println!("{} maps extracted", output.manifest.total_maps);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2maps` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2maps = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::{Capabilities, CapabilityError, PageClassifier, PerimeterPainter, TextReader};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, SegmentationError};
pub use extract::{extract_all, extract_from_pages, MANIFEST_FILENAME};
pub use output::{
    ExtractionOutput, ExtractionStats, MapManifest, MapMetadata, MapSource, MapType,
};
pub use pipeline::detect::MapDetectionResult;
pub use pipeline::render::{EmbeddedImage, PageAssets};
