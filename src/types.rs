use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::{Result, TriptychError};

/// Input shape of a generation request: a bare text prompt, or a source
/// image plus an edit instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Text,
    Image,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    Dalle2,
    Dalle3,
    Gemini,
}

impl ModelId {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dalle2 => "DALL-E 2",
            Self::Dalle3 => "DALL-E 3",
            Self::Gemini => "Gemini",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Decodable image payload supplied by the caller (file bytes or a
/// `data:` URI from an upload/capture front end).
#[derive(Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("media_type", &self.media_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl SourceImage {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Parse a `data:<media type>;base64,<payload>` URI.
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let rest = data_url.strip_prefix("data:").ok_or_else(|| {
            TriptychError::Validation("source image data url must start with data:".to_string())
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            TriptychError::Validation("source image data url is missing its payload".to_string())
        })?;
        let media_type = header.strip_suffix(";base64").ok_or_else(|| {
            TriptychError::Validation("source image data url must be base64-encoded".to_string())
        })?;
        if media_type.trim().is_empty() {
            return Err(TriptychError::Validation(
                "source image data url is missing a media type".to_string(),
            ));
        }

        let data = BASE64.decode(payload.trim()).map_err(|err| {
            TriptychError::Validation(format!("source image is not valid base64: {err}"))
        })?;
        Ok(Self {
            media_type: media_type.to_string(),
            data,
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }
}

/// One user request, normalized. `mode() == Mode::Image` implies a source
/// image is present; the constructors make any other combination
/// unrepresentable.
#[derive(Debug, Clone)]
pub struct GenerationIntent {
    prompt: String,
    source: Option<SourceImage>,
}

impl GenerationIntent {
    pub fn text(prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(TriptychError::Validation(
                "prompt must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            prompt,
            source: None,
        })
    }

    pub fn edit(prompt: impl Into<String>, source: SourceImage) -> Result<Self> {
        let mut intent = Self::text(prompt)?;
        intent.source = Some(source);
        Ok(intent)
    }

    pub fn mode(&self) -> Mode {
        if self.source.is_some() {
            Mode::Image
        } else {
            Mode::Text
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }
}

/// Normalized result of a provider call: either a URL the provider hosts,
/// or an inline base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageRef {
    Url { url: String },
    Data { media_type: String, data: String },
}

impl ImageRef {
    /// Renderable source string: the remote URL, or a `data:` URI for
    /// inline payloads.
    pub fn display_source(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Data { media_type, data } => format!("data:{media_type};base64,{data}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_intent_trims_prompt() -> Result<()> {
        let intent = GenerationIntent::text("  a red fox  ")?;
        assert_eq!(intent.prompt(), "a red fox");
        assert_eq!(intent.mode(), Mode::Text);
        assert!(intent.source().is_none());
        Ok(())
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = GenerationIntent::text("   ").unwrap_err();
        assert!(matches!(err, TriptychError::Validation(_)));
    }

    #[test]
    fn edit_intent_carries_source() -> Result<()> {
        let source = SourceImage::new("image/png", vec![1, 2, 3]);
        let intent = GenerationIntent::edit("add a hat", source)?;
        assert_eq!(intent.mode(), Mode::Image);
        assert_eq!(intent.source().expect("source").media_type, "image/png");
        Ok(())
    }

    #[test]
    fn source_image_round_trips_through_data_url() -> Result<()> {
        let source = SourceImage::from_data_url("data:image/jpeg;base64,AQIDBAU=")?;
        assert_eq!(source.media_type, "image/jpeg");
        assert_eq!(source.data, vec![1, 2, 3, 4, 5]);
        assert_eq!(source.to_base64(), "AQIDBAU=");
        Ok(())
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        for input in [
            "image/jpeg;base64,AQID",
            "data:image/jpeg;base64",
            "data:image/jpeg,AQID",
            "data:;base64,AQID",
            "data:image/jpeg;base64,not base64!!",
        ] {
            let err = SourceImage::from_data_url(input).unwrap_err();
            assert!(matches!(err, TriptychError::Validation(_)), "{input}");
        }
    }

    #[test]
    fn image_ref_display_source() {
        let url = ImageRef::Url {
            url: "https://example.com/cat.png".to_string(),
        };
        assert_eq!(url.display_source(), "https://example.com/cat.png");

        let inline = ImageRef::Data {
            media_type: "image/png".to_string(),
            data: "AQID".to_string(),
        };
        assert_eq!(inline.display_source(), "data:image/png;base64,AQID");
    }
}
