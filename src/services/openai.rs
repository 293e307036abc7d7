use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generates free text from a system/user prompt pair.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, UpstreamError>;
}

/// Generates one image from a prompt, returning the raw encoded bytes.
#[async_trait]
pub trait ImageSynthesis: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError>;
}

/// Client for an OpenAI-compatible chat completion and image generation API.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    image_size: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        text_model: &str,
        image_model: &str,
        image_size: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            text_model: text_model.to_string(),
            image_model: image_model.to_string(),
            image_size: image_size.to_string(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, UpstreamError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TextCompletion for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.text_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
        };

        let response: ChatResponse = self.post("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(UpstreamError::EmptyResponse)
    }
}

#[async_trait]
impl ImageSynthesis for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: &self.image_size,
        };

        let response: ImageResponse = self.post("images/generations", &request).await?;

        let encoded = response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.b64_json)
            .ok_or(UpstreamError::EmptyResponse)?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(UpstreamError::Decode)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation API returned no content")]
    EmptyResponse,

    #[error("Failed to decode generated image: {0}")]
    Decode(#[from] base64::DecodeError),
}
