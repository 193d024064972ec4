//! Gemini (Google) image edit client.

use crate::client::EditClient;
use crate::config::EditConfig;
use crate::error::{parse_retry_after, sanitize_error_message, EditError, Result};
use crate::image::{EditMetadata, EditedImage, ImageFormat, InlinePayload, SourceImage};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }

    /// Parses an API model identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "gemini-2.5-flash-image" | "nano-banana" => Some(Self::NanoBanana),
            "nano-banana-pro-preview" | "nano-banana-pro" => Some(Self::NanoBananaPro),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edit client backed by Gemini `generateContent`.
pub struct GeminiEditClient {
    client: reqwest::Client,
    config: EditConfig,
}

impl GeminiEditClient {
    /// Creates a client from startup configuration.
    pub fn new(config: EditConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Returns the configured model.
    pub fn model(&self) -> GeminiModel {
        self.config.model()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url(),
            self.config.model().as_str(),
        )
    }

    async fn edit_impl(&self, image: &SourceImage, prompt: &str) -> Result<EditedImage> {
        let start = Instant::now();
        let body = GeminiRequest::new(image, prompt);

        tracing::debug!(
            model = %self.config.model(),
            media_type = %image.media_type(),
            image_bytes = image.size(),
            "sending edit request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.config.api_key())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let text = response.text().await?;
        let (data, format) = ResponseOutcome::decode(&text).into_result()?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(duration_ms, size = data.len(), "edit request complete");

        Ok(EditedImage::new(
            data,
            format,
            EditMetadata {
                model: Some(self.config.model().as_str().to_string()),
                duration_ms: Some(duration_ms),
            },
        ))
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> EditError {
    let text = sanitize_error_message(text);
    match status {
        401 | 403 => EditError::Auth(text),
        429 => EditError::RateLimited {
            retry_after: parse_retry_after(headers).map(std::time::Duration::from_secs),
        },
        _ => EditError::Api {
            status,
            message: text,
        },
    }
}

#[async_trait]
impl EditClient for GeminiEditClient {
    async fn edit(&self, image: &SourceImage, prompt: &str) -> Result<EditedImage> {
        self.edit_impl(image, prompt).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Result of validating a `generateContent` response body.
#[derive(Debug, PartialEq, Eq)]
enum ResponseOutcome {
    Image { data: Vec<u8>, format: ImageFormat },
    Empty(String),
    Malformed(String),
}

const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "IMAGE_RECITATION",
    "RECITATION",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "IMAGE_OTHER",
    "NO_IMAGE",
];

impl ResponseOutcome {
    fn decode(body: &str) -> Self {
        let response: GeminiResponse = match serde_json::from_str(body) {
            Ok(response) => response,
            Err(e) => return Self::Malformed(format!("invalid response body: {e}")),
        };

        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Self::Empty(format!("prompt blocked: {reason}"));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Self::Empty("no candidates".into());
        };

        let finish_reason = candidate.finish_reason.unwrap_or_default();
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            return if SAFETY_FINISH_REASONS.contains(&finish_reason.as_str()) {
                Self::Empty(format!("declined: {finish_reason}"))
            } else {
                Self::Empty("no content parts".into())
            };
        }

        let Some(inline) = parts.into_iter().find_map(|p| p.inline_data) else {
            return Self::Malformed("no inline image data in content parts".into());
        };

        match base64::engine::general_purpose::STANDARD.decode(&inline.data) {
            Ok(data) if !data.is_empty() => {
                let format = ImageFormat::from_mime_type(&inline.mime_type)
                    .or_else(|| ImageFormat::from_magic_bytes(&data))
                    .unwrap_or_default();
                Self::Image { data, format }
            }
            Ok(_) => Self::Malformed("inline image data is empty".into()),
            Err(e) => Self::Malformed(format!("inline image data is not base64: {e}")),
        }
    }

    fn into_result(self) -> Result<(Vec<u8>, ImageFormat)> {
        match self {
            Self::Image { data, format } => Ok((data, format)),
            Self::Empty(reason) => Err(EditError::EmptyResponse(reason)),
            Self::Malformed(reason) => Err(EditError::MalformedResponse(reason)),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlinePayload,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn new(image: &SourceImage, prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiRequestPart::InlineData {
                        inline_data: InlinePayload::from(image),
                    },
                    GeminiRequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}
