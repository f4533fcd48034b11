//! Instruction texts for the three capability calls.
//!
//! Centralising every instruction here serves two purposes:
//!
//! 1. **Single source of truth** — changing how detection describes map types
//!    or how tightly the perimeter must be drawn is a one-place edit.
//!
//! 2. **Testability** — the response parser is tested against the exact JSON
//!    shape this prompt requests, so prompt and parser cannot drift apart
//!    silently.

/// Instruction for the per-page map-detection call.
///
/// The model must answer with exactly the JSON object the parser in
/// [`crate::capability::parse`] expects. Markdown fences around the object
/// are tolerated (and stripped) because vision models add them habitually.
pub const DETECTION_PROMPT: &str = r#"You are analysing one page of a tabletop-RPG adventure module.

Decide whether the page contains a MAP — either:
- a navigation map: an overview map of a dungeon, town, or wilderness showing rooms/terrain and how they connect, or
- a battle map: a tactical, grid-aligned map for a specific encounter area.

Decorative borders, illustrations, portraits, and stat-block art are NOT maps.

Respond with ONLY this JSON object and nothing else:
{"has_map": true|false, "type": "navigation_map"|"battle_map", "name": "<short name, 3 words max>"}

If has_map is false, omit "type" and "name"."#;

/// Instruction for the perimeter-drawing (image generation) call.
///
/// The geometry engine recovers the crop rectangle from the drawn border, so
/// the instruction stresses tightness and the exclusion of prose columns.
pub const PERIMETER_INSTRUCTION: &str = "Draw a tight, bright red (RGB 255,0,0) \
rectangular perimeter around the map region of this page. The line must hug \
the map edges with no padding. Exclude all running text, sidebars, and page \
decoration. Change nothing else about the image.";

/// Instruction for the OCR capability call.
///
/// Word count is the only signal the validator uses, so the model is asked
/// for a bare transcription with no commentary.
pub const OCR_PROMPT: &str = "Transcribe every piece of text visible in this \
image, verbatim. Output only the transcribed text with no commentary. If \
there is no text, output nothing.";
