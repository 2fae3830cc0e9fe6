//! Client for the picture description service.
//!
//! Speaks the OpenAI-compatible chat-completions protocol: one user message
//! carrying the instruction prompt and the picture as a base64 data URI.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VisionConfig;
use crate::error::{ServiceError, ServiceResult, VisionError};
use crate::ingestion::PictureEncoding;

/// Produces a natural-language description of a picture
#[async_trait]
pub trait DescriptionClient: Send + Sync {
    async fn describe(&self, data: &[u8], encoding: PictureEncoding)
    -> Result<String, VisionError>;
}

/// HTTP description client
pub struct VisionClient {
    client: Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build description client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Inline a picture as a `data:` URI
pub fn data_uri(data: &[u8], encoding: PictureEncoding) -> String {
    format!("data:{};base64,{}", encoding.mime_type(), BASE64.encode(data))
}

#[async_trait]
impl DescriptionClient for VisionClient {
    async fn describe(
        &self,
        data: &[u8],
        encoding: PictureEncoding,
    ) -> Result<String, VisionError> {
        let url = self.completions_url();

        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![CompletionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: self.config.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_uri(data, encoding),
                        },
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await.map_err(|e| VisionError::Connection {
            url: url.clone(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| VisionError::InvalidResponse { source: e })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(VisionError::EmptyCompletion)?;

        debug!(
            bytes = data.len(),
            description_len = content.len(),
            "Picture described"
        );

        Ok(content)
    }
}

// ==================== Wire Types ====================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    content: Option<String>,
}
