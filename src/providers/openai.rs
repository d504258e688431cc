use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::image::ImageModel;
use crate::raster;
use crate::types::{GenerationIntent, ImageRef, Mode, ModelId};
use crate::{Result, TriptychError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI image adapter covering both DALL-E variants. Text prompts go to
/// the generation endpoint as JSON; image edits (DALL-E 2 only) go to the
/// edit endpoint as a multipart form with a size-bounded PNG.
#[derive(Clone)]
pub struct OpenAiImages {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    id: ModelId,
    model: &'static str,
    size: &'static str,
    quality: Option<&'static str>,
}

impl OpenAiImages {
    /// DALL-E 2: 512x512, text generation and image edits.
    pub fn dalle2(api_key: impl Into<String>) -> Self {
        Self::for_variant(api_key, ModelId::Dalle2, "dall-e-2", "512x512", None)
    }

    /// DALL-E 3: 1024x1024 standard quality, text-to-image only.
    pub fn dalle3(api_key: impl Into<String>) -> Self {
        Self::for_variant(
            api_key,
            ModelId::Dalle3,
            "dall-e-3",
            "1024x1024",
            Some("standard"),
        )
    }

    fn for_variant(
        api_key: impl Into<String>,
        id: ModelId,
        model: &'static str,
        size: &'static str,
        quality: Option<&'static str>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            id,
            model,
            size,
            quality,
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

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn generate_from_text(&self, prompt: &str) -> Result<ImageRef> {
        let mut body = Map::<String, Value>::new();
        body.insert("model".to_string(), Value::String(self.model.to_string()));
        body.insert("prompt".to_string(), Value::String(prompt.to_string()));
        body.insert("n".to_string(), Value::Number(1.into()));
        body.insert("size".to_string(), Value::String(self.size.to_string()));
        if let Some(quality) = self.quality {
            body.insert("quality".to_string(), Value::String(quality.to_string()));
        }

        tracing::debug!(model = self.model, "sending image generation request");
        let response = self
            .http
            .post(self.endpoint("images/generations"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        Self::parse_image_url(response).await
    }

    async fn edit_image(&self, intent: &GenerationIntent) -> Result<ImageRef> {
        let source = intent.source().ok_or_else(|| {
            TriptychError::Validation("image edit requires a source image".to_string())
        })?;
        let png = raster::normalize_to_png(source)?;

        let image_part = Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|err| {
                TriptychError::Validation(format!("invalid image part media type: {err}"))
            })?;
        let form = Form::new()
            .part("image", image_part)
            .text("prompt", intent.prompt().to_string())
            .text("model", self.model)
            .text("n", "1")
            .text("size", self.size);

        tracing::debug!(model = self.model, "sending image edit request");
        let response = self
            .http
            .post(self.endpoint("images/edits"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        Self::parse_image_url(response).await
    }

    async fn parse_image_url(response: reqwest::Response) -> Result<ImageRef> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriptychError::Api { status, body });
        }

        let parsed = response.json::<ImagesResponse>().await?;
        let url = parsed
            .data
            .first()
            .and_then(|item| item.url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                TriptychError::InvalidResponse("image item is missing url".to_string())
            })?;

        Ok(ImageRef::Url {
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl ImageModel for OpenAiImages {
    fn id(&self) -> ModelId {
        self.id
    }

    fn supports(&self, mode: Mode) -> bool {
        match mode {
            Mode::Text => true,
            Mode::Image => self.id == ModelId::Dalle2,
        }
    }

    async fn generate(&self, intent: &GenerationIntent) -> Result<ImageRef> {
        match intent.mode() {
            Mode::Text => self.generate_from_text(intent.prompt()).await,
            Mode::Image => self.edit_image(intent).await,
        }
    }
}
