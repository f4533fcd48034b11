//! Capability boundary: the three external AI abilities the pipeline consumes.
//!
//! The pipeline never talks to a model SDK directly. Each external ability is
//! a small trait — classify a page, repaint an image, read text — and every
//! component receives its capabilities through a [`Capabilities`] bundle
//! constructed by the caller. Tests substitute stub implementations; the CLI
//! wires up the real backends ([`llm`] over edgequake-llm, [`paint`] over an
//! OpenAI-compatible image-edit endpoint).
//!
//! No capability implementation holds mutable state: each is a stateless
//! request/response client safely shared (`Arc`) across concurrent workers.

pub mod llm;
pub mod paint;
pub mod parse;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a capability call, before any structural interpretation.
///
/// Transport and API errors land here; malformed *content* (bad JSON from
/// the classifier) is a [`parse::ParseError`] raised by the adapter instead.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The backing API call failed (network, HTTP status, SDK error).
    #[error("API error: {0}")]
    Api(String),

    /// The response arrived but its payload could not be decoded.
    #[error("response decode error: {0}")]
    Decode(String),
}

/// Vision classification: look at a page image, answer a structured question.
///
/// Returns the model's raw text response; structural parsing (fence
/// stripping, JSON decoding) is the caller's job via [`parse`].
#[async_trait]
pub trait PageClassifier: Send + Sync {
    async fn classify(&self, page_png: &[u8], instruction: &str)
        -> Result<String, CapabilityError>;
}

/// Image generation: return a modified copy of the input image.
///
/// The pipeline uses this for exactly one thing — drawing a red perimeter —
/// but the trait is deliberately ignorant of that. Returned image dimensions
/// may differ from the input; callers must rescale coordinates.
#[async_trait]
pub trait PerimeterPainter: Send + Sync {
    async fn paint(
        &self,
        image_png: &[u8],
        instruction: &str,
        temperature: f32,
    ) -> Result<Vec<u8>, CapabilityError>;
}

/// OCR: extract whatever text an image contains.
///
/// The validator only counts whitespace-delimited tokens, so the contract is
/// just "text out"; layout fidelity is irrelevant.
#[async_trait]
pub trait TextReader: Send + Sync {
    async fn read_text(&self, image_png: &[u8]) -> Result<String, CapabilityError>;
}

/// The bundle of capabilities a run needs, shared read-only across workers.
#[derive(Clone)]
pub struct Capabilities {
    pub classifier: Arc<dyn PageClassifier>,
    pub painter: Arc<dyn PerimeterPainter>,
    pub reader: Arc<dyn TextReader>,
}

impl Capabilities {
    /// Bundle explicit implementations (the test seam).
    pub fn new(
        classifier: Arc<dyn PageClassifier>,
        painter: Arc<dyn PerimeterPainter>,
        reader: Arc<dyn TextReader>,
    ) -> Self {
        Self {
            classifier,
            painter,
            reader,
        }
    }
}
