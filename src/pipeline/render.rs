//! PDF rasterisation and embedded-image harvest via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so Tokio workers never stall during CPU-heavy rendering.
//!
//! ## Why harvest embedded images here?
//!
//! This is the only module allowed to touch pdfium. Collecting each page's
//! embedded raster resources at render time means the structural extractor
//! downstream is a pure function over [`PageAssets`] — unit-testable with
//! synthetic data, no PDF required.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One raster image embedded in a page's resource table.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Decoded pixel data at the image's native resolution.
    pub image: DynamicImage,
}

impl EmbeddedImage {
    pub fn pixel_area(&self) -> u64 {
        self.image.width() as u64 * self.image.height() as u64
    }
}

/// Everything the pipeline needs from one PDF page.
///
/// Immutable once rendered; owned by the orchestrator for the lifetime of
/// processing that page.
#[derive(Debug, Clone)]
pub struct PageAssets {
    /// 0-based page index.
    pub index: usize,
    /// Page rendered at the configured DPI.
    pub image: RgbImage,
    /// Raster images embedded in the page, in resource order.
    pub embedded: Vec<EmbeddedImage>,
}

impl PageAssets {
    /// 1-indexed page number, as used in filenames and the manifest.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }

    /// Rendered page area in pixels.
    pub fn pixel_area(&self) -> u64 {
        self.image.width() as u64 * self.image.height() as u64
    }
}

/// Validate the input path: exists, readable, starts with `%PDF`.
///
/// Catching a bad path here yields a meaningful error instead of a pdfium
/// crash deep inside the blocking task.
pub fn validate_input(path_str: &str) -> Result<PathBuf, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ExtractError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    }

    debug!("Resolved input PDF: {}", path.display());
    Ok(path)
}

/// Rasterise every page of a PDF and collect its embedded images.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn render_document(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<PageAssets>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || render_document_blocking(&path, dpi, max_pixels))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of document rendering.
fn render_document_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<PageAssets>, ExtractError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;
    let pdfium = Pdfium::new(bindings);

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if total_pages == 0 {
        return Err(ExtractError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        });
    }

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        // Target width from physical size and DPI, capped so poster-sized
        // pages cannot exhaust memory.
        let width_pts = page.width().value;
        let target_width = ((width_pts / 72.0) * dpi as f32).round() as u32;
        let target_width = target_width.clamp(100, max_pixels);

        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width as i32)
            .set_maximum_height(max_pixels as i32);

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| ExtractError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

        let image = bitmap.as_image().to_rgb8();
        let embedded = harvest_embedded_images(&page, idx + 1);

        debug!(
            "Rendered page {} → {}x{} px, {} embedded image(s)",
            idx + 1,
            image.width(),
            image.height(),
            embedded.len()
        );

        results.push(PageAssets {
            index: idx,
            image,
            embedded,
        });
    }

    Ok(results)
}

/// Collect the decoded raster images embedded in a page.
///
/// Undecodable images are skipped with a warning rather than failing the
/// page: a broken illustration must not block map extraction.
fn harvest_embedded_images(page: &PdfPage<'_>, page_num: usize) -> Vec<EmbeddedImage> {
    let mut embedded = Vec::new();

    for object in page.objects().iter() {
        if let Some(image_object) = object.as_image_object() {
            match image_object.get_raw_image() {
                Ok(image) => embedded.push(EmbeddedImage { image }),
                Err(e) => {
                    warn!(
                        "Page {}: skipping undecodable embedded image: {:?}",
                        page_num, e
                    );
                }
            }
        }
    }

    embedded
}
