use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::image::ImageModel;
use crate::types::{GenerationIntent, ImageRef, Mode, ModelId};
use crate::{Result, TriptychError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Gemini image adapter. Both prompt modes go through `generateContent`;
/// the result arrives as an inline base64 payload rather than a hosted URL.
#[derive(Clone)]
pub struct GoogleImages {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GoogleImages {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn generate_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model = self.model.trim();
        if model.starts_with("models/") {
            format!("{base}/{model}:generateContent")
        } else {
            format!("{base}/models/{model}:generateContent")
        }
    }

    fn build_parts(intent: &GenerationIntent) -> Vec<Value> {
        match intent.source() {
            None => vec![serde_json::json!({
                "text": format!("Generate an image: {}", intent.prompt())
            })],
            Some(source) => vec![
                serde_json::json!({
                    "text": format!("Generate the edited image: {}", intent.prompt())
                }),
                serde_json::json!({
                    "inlineData": {
                        "mimeType": source.media_type,
                        "data": source.to_base64(),
                    }
                }),
            ],
        }
    }

    fn extract_inline_image(parsed: &GenerateContentResponse) -> Result<ImageRef> {
        let parts = parsed
            .candidates
            .first()
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TriptychError::InvalidResponse("invalid response format".to_string())
            })?;

        for part in parts {
            let Some(inline) = part.get("inlineData") else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .filter(|data| !data.is_empty())
                .ok_or_else(|| {
                    TriptychError::InvalidResponse("no image data in response".to_string())
                })?;
            let media_type = inline
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png");

            return Ok(ImageRef::Data {
                media_type: media_type.to_string(),
                data: data.to_string(),
            });
        }

        Err(TriptychError::InvalidResponse(
            "no image data in response".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Value>,
}

#[async_trait]
impl ImageModel for GoogleImages {
    fn id(&self) -> ModelId {
        ModelId::Gemini
    }

    fn supports(&self, _mode: Mode) -> bool {
        true
    }

    async fn generate(&self, intent: &GenerationIntent) -> Result<ImageRef> {
        let mut body = Map::<String, Value>::new();
        body.insert(
            "contents".to_string(),
            Value::Array(vec![serde_json::json!({
                "parts": Self::build_parts(intent)
            })]),
        );

        tracing::debug!(model = %self.model, "sending generate content request");
        let response = self
            .http
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriptychError::Api { status, body });
        }

        let parsed = response.json::<GenerateContentResponse>().await?;
        Self::extract_inline_image(&parsed)
    }
}
