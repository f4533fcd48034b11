//! Output types: per-map metadata, the run manifest, and run statistics.
//!
//! The manifest is the run's durable contract with downstream consumers
//! (the VTT publishing layer reads it to know which PNGs exist and what they
//! are). Records are append-only: a [`MapMetadata`] is created exactly once
//! when a page's extraction succeeds and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What kind of map a page contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    /// Overview map (dungeon/wilderness) showing rooms or terrain.
    NavigationMap,
    /// Tactical grid-aligned map for a specific encounter area.
    BattleMap,
}

/// Which extraction path produced the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSource {
    /// Pulled directly from the page's embedded raster resources.
    Extracted,
    /// Recovered via the red-perimeter segmentation loop.
    Segmented,
}

/// Metadata for one successfully extracted map asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapMetadata {
    /// Short map name from the detector (at most 3 words).
    pub name: String,
    /// Chapter the source PDF belongs to, if the caller supplied one.
    pub chapter: Option<String>,
    /// 1-indexed page number in the source PDF.
    pub page_num: usize,
    /// Navigation or battle map.
    #[serde(rename = "type")]
    pub map_type: MapType,
    /// Extraction path that produced the PNG.
    pub source: MapSource,
}

/// The JSON manifest written at the end of a run (`maps_metadata.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapManifest {
    /// ISO-8601 timestamp of when the run finished.
    pub extracted_at: String,
    /// Number of entries in `maps`.
    pub total_maps: usize,
    /// One record per extracted map, in page order.
    pub maps: Vec<MapMetadata>,
}

impl MapManifest {
    /// Build a manifest from a page-ordered set of records, stamped now.
    pub fn new(mut maps: Vec<MapMetadata>) -> Self {
        maps.sort_by_key(|m| m.page_num);
        Self {
            extracted_at: chrono::Utc::now().to_rfc3339(),
            total_maps: maps.len(),
            maps,
        }
    }
}

/// Aggregate statistics for one extraction run.
///
/// Informational only — the manifest is the source of truth for what was
/// produced; the stats exist so the CLI can print a meaningful summary line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages scanned by the detector.
    pub pages_scanned: usize,
    /// Pages the detector flagged as map-bearing.
    pub maps_detected: usize,
    /// Maps taken straight from embedded raster resources.
    pub maps_extracted: usize,
    /// Maps recovered through the segmentation loop.
    pub maps_segmented: usize,
    /// Map-bearing pages that failed both extraction paths.
    pub pages_failed: usize,
    /// Wall-clock time spent rasterising, in milliseconds.
    pub render_duration_ms: u64,
    /// Wall-clock time for the whole run, in milliseconds.
    pub total_duration_ms: u64,
}

/// The result of one run: the manifest plus run statistics.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Manifest as written to `maps_metadata.json`.
    pub manifest: MapManifest,
    /// Run statistics for reporting.
    pub stats: ExtractionStats,
}

/// Output filename for a map asset: `page_<NNN>_<slug>.png`.
pub fn asset_filename(page_num: usize, name: &str) -> String {
    format!("page_{:03}_{}.png", page_num, slugify(name))
}

/// Path to the diagnostics directory inside the run's output directory.
pub fn temp_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("temp")
}

/// Lowercase a display name into a filesystem-safe slug.
///
/// Runs of non-alphanumeric characters collapse into single underscores;
/// the result is capped at 48 bytes so generated paths stay short.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug.truncate(48);
    if slug.is_empty() {
        slug.push_str("map");
    }
    slug
}
