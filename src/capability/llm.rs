//! Capability adapters backed by edgequake-llm vision providers.
//!
//! Both classification and OCR are "look at an image, answer in text" calls,
//! so they share one thin wrapper over [`LLMProvider::chat`] with a base64
//! PNG attachment — the same message layout the multimodal APIs expect from
//! any vision request. Prompt content is the only difference between the two
//! adapters.

use crate::capability::{CapabilityError, PageClassifier, TextReader};
use crate::error::ExtractError;
use crate::prompts::OCR_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Wrap raw PNG bytes for a multimodal API request body.
///
/// `detail: "high"` matters for detection: map labels and grid lines are
/// exactly the fine structure a low-detail overview tile throws away.
fn to_image_data(png: &[u8]) -> ImageData {
    ImageData::new(STANDARD.encode(png), "image/png").with_detail("high")
}

/// One vision round-trip: system instruction + image, text back.
async fn vision_call(
    provider: &Arc<dyn LLMProvider>,
    instruction: &str,
    png: &[u8],
    temperature: f32,
) -> Result<String, CapabilityError> {
    let messages = vec![
        ChatMessage::system(instruction),
        // APIs require at least one user turn; the image carries the content.
        ChatMessage::user_with_images("", vec![to_image_data(png)]),
    ];
    let options = CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(1024),
        ..Default::default()
    };

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| CapabilityError::Api(e.to_string()))?;

    debug!(
        "vision call: {} prompt tokens, {} completion tokens",
        response.prompt_tokens, response.completion_tokens
    );
    Ok(response.content)
}

/// [`PageClassifier`] over an edgequake-llm vision provider.
pub struct LlmClassifier {
    provider: Arc<dyn LLMProvider>,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PageClassifier for LlmClassifier {
    async fn classify(
        &self,
        page_png: &[u8],
        instruction: &str,
    ) -> Result<String, CapabilityError> {
        // Near-zero temperature: classification should be repeatable.
        vision_call(&self.provider, instruction, page_png, 0.1).await
    }
}

/// [`TextReader`] over an edgequake-llm vision provider.
///
/// Vision-model transcription stands in for a dedicated OCR engine; the
/// validator only consumes the word count, so transcription quality beyond
/// "roughly all the words" is irrelevant.
pub struct LlmTextReader {
    provider: Arc<dyn LLMProvider>,
}

impl LlmTextReader {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TextReader for LlmTextReader {
    async fn read_text(&self, image_png: &[u8]) -> Result<String, CapabilityError> {
        vision_call(&self.provider, OCR_PROMPT, image_png, 0.0).await
    }
}

/// Resolve a vision provider, from most-specific to least-specific.
///
/// 1. **Named provider + model** — the caller named a provider (e.g.
///    `"openai"`); the factory reads the matching API key from the
///    environment.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    a provider chosen at the execution-environment level (Makefile, CI).
/// 3. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans known API-key variables and picks the first available provider.
pub fn resolve_provider(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(name) = provider_name {
        let model = model.unwrap_or("gpt-4.1-mini");
        return ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        });
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return ProviderFactory::create_llm_provider(&prov, &model).map_err(|e| {
                ExtractError::ProviderNotConfigured {
                    provider: prov.clone(),
                    hint: format!("{e}"),
                }
            });
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
