//! Perimeter painter backed by an OpenAI-compatible image-edit endpoint.
//!
//! Image generation lives behind plain HTTP rather than the chat SDK because
//! edit endpoints speak a different request shape (image in, image out).
//! The client is stateless: one `reqwest::Client` shared across workers,
//! credentials fixed at construction.
//!
//! Returned images routinely come back at a different resolution than the
//! input — the endpoint resizes to its model's native grid — which is why
//! the geometry engine rescales coordinates instead of trusting dimensions.

use crate::capability::{CapabilityError, PerimeterPainter};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default request timeout. Image generation is slow; chat-level timeouts
/// would abort healthy calls.
const PAINT_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Serialize)]
struct EditRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    /// Base64 PNG of the image to edit.
    image: String,
    temperature: f32,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    data: Vec<EditDatum>,
}

#[derive(Debug, Deserialize)]
struct EditDatum {
    b64_json: Option<String>,
}

/// [`PerimeterPainter`] over an image-edit HTTP endpoint.
pub struct HttpPerimeterPainter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpPerimeterPainter {
    /// Build a painter for `endpoint` (a full URL, e.g.
    /// `https://api.example.com/v1/images/edits`).
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PAINT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CapabilityError::Api(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl PerimeterPainter for HttpPerimeterPainter {
    async fn paint(
        &self,
        image_png: &[u8],
        instruction: &str,
        temperature: f32,
    ) -> Result<Vec<u8>, CapabilityError> {
        let body = EditRequest {
            model: &self.model,
            prompt: instruction,
            image: STANDARD.encode(image_png),
            temperature,
            n: 1,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Api(format!(
                "image-edit endpoint returned HTTP {status}: {detail}"
            )));
        }

        let parsed: EditResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Decode(e.to_string()))?;

        let b64 = parsed
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| CapabilityError::Decode("response carried no image data".into()))?;

        let bytes = STANDARD
            .decode(b64.trim())
            .map_err(|e| CapabilityError::Decode(format!("invalid base64 image: {e}")))?;

        debug!("painter returned {} bytes", bytes.len());
        Ok(bytes)
    }
}
