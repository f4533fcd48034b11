//! CLI binary for pdf2maps.
//!
//! A thin shim over the library crate that wires up capability backends,
//! maps flags to `ExtractionConfig`, and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2maps::capability::llm::{resolve_provider, LlmClassifier, LlmTextReader};
use pdf2maps::capability::paint::HttpPerimeterPainter;
use pdf2maps::{extract_all, Capabilities, ExtractionConfig};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract all maps from a module into ./map_assets
  pdf2maps --pdf curse_of_strahd.pdf --output map_assets

  # Tag extracted maps with a chapter name
  pdf2maps --pdf module.pdf --output out --chapter "Chapter 3"

  # Use a specific vision model
  pdf2maps --pdf module.pdf --output out --provider openai --model gpt-4.1

OUTPUT LAYOUT:
  <output>/maps_metadata.json            run manifest (timestamp, count, records)
  <output>/page_012_goblin_cave.png      one PNG per extracted map
  <output>/temp/..._preprocessed.png     segmentation diagnostics
  <output>/temp/..._with_red_perimeter.png

EXIT CODES:
  0  extraction completed (including a PDF that contains zero maps)
  1  PDF missing/corrupt, output directory not creatable, or other fatal error

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY           OpenAI API key (also used for the image-edit endpoint)
  ANTHROPIC_API_KEY        Anthropic API key
  EDGEQUAKE_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL          Override model ID
  PDFIUM_DYNAMIC_LIB_PATH  Path to an existing libpdfium
"#;

/// Extract map artwork from PDF adventure modules using vision models.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2maps",
    version,
    about = "Extract map artwork from PDF adventure modules using vision models",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the module PDF.
    #[arg(long, env = "PDF2MAPS_PDF")]
    pdf: PathBuf,

    /// Directory to write map PNGs and the manifest into.
    #[arg(long, env = "PDF2MAPS_OUTPUT", default_value = "map_assets")]
    output: PathBuf,

    /// Chapter name recorded in each map's metadata.
    #[arg(long, env = "PDF2MAPS_CHAPTER")]
    chapter: Option<String>,

    /// Vision model ID for detection and OCR (e.g. gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision provider: openai, anthropic, gemini, ollama.
    /// Auto-detected from API-key env vars if not set.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Image-edit endpoint used to draw the red perimeter.
    #[arg(
        long,
        env = "PDF2MAPS_PAINT_ENDPOINT",
        default_value = "https://api.openai.com/v1/images/edits"
    )]
    paint_endpoint: String,

    /// Model ID for the image-edit endpoint.
    #[arg(long, env = "PDF2MAPS_PAINT_MODEL", default_value = "gpt-image-1")]
    paint_model: String,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2MAPS_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of concurrent page workers.
    #[arg(short, long, env = "PDF2MAPS_WORKERS", default_value_t = 5)]
    workers: usize,

    /// Sampling temperature for perimeter drawing (0.0–2.0).
    #[arg(long, env = "PDF2MAPS_TEMPERATURE", default_value_t = 0.5)]
    temperature: f32,

    /// Max perimeter-drawing attempts per page.
    #[arg(long, env = "PDF2MAPS_SEGMENT_ATTEMPTS", default_value_t = 5)]
    segment_attempts: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MAPS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MAPS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", red("error:"));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Capability wiring ────────────────────────────────────────────────
    let provider = resolve_provider(cli.provider.as_deref(), cli.model.as_deref())
        .context("Failed to resolve vision provider")?;

    let painter = HttpPerimeterPainter::new(
        &cli.paint_endpoint,
        &cli.paint_model,
        std::env::var("OPENAI_API_KEY").ok(),
    )
    .context("Failed to build image-edit client")?;

    let caps = Capabilities::new(
        Arc::new(LlmClassifier::new(provider.clone())),
        Arc::new(painter),
        Arc::new(LlmTextReader::new(provider)),
    );

    // ── Build config ─────────────────────────────────────────────────────
    let config = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .workers(cli.workers)
        .temperature(cli.temperature)
        .segment_attempts(cli.segment_attempts)
        .build()
        .context("Invalid configuration")?;

    // ── Run extraction ───────────────────────────────────────────────────
    let pdf = cli.pdf.to_string_lossy().to_string();
    let output = extract_all(&pdf, &cli.output, cli.chapter.as_deref(), &caps, &config)
        .await
        .context("Extraction failed")?;

    if !cli.quiet {
        let stats = &output.stats;
        let tick = if stats.pages_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        };
        eprintln!(
            "{tick}  {} maps from {} pages  →  {}",
            bold(&output.manifest.total_maps.to_string()),
            stats.pages_scanned,
            bold(&cli.output.display().to_string()),
        );
        eprintln!(
            "   {} extracted  /  {} segmented  /  {} failed  —  {}ms total",
            dim(&stats.maps_extracted.to_string()),
            dim(&stats.maps_segmented.to_string()),
            dim(&stats.pages_failed.to_string()),
            stats.total_duration_ms,
        );
    }

    Ok(())
}
