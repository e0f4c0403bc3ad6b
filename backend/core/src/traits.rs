use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::availability::Availability;
use crate::message::{ChatRole, DetectedLanguage, SummaryOptions};
use crate::types::ImagePayload;

/// Incremental text chunks from a streaming model call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Progress callback; receives a fraction in `0.0..=1.0`.
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// One turn of a model conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: ChatRole,
    pub content: String,
    /// Base64 image payloads attached to this turn.
    pub images: Vec<String>,
}

impl LlmMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: &ImagePayload) -> Self {
        self.images.push(image.to_base64());
        self
    }
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages: Vec::new(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_message(mut self, message: LlmMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| !m.images.is_empty())
    }
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// A local model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "ollama", "mock").
    fn name(&self) -> &str;

    /// Whether `model` can be used right now, or must be fetched first.
    async fn availability(&self, model: &str) -> Availability;

    /// Fetch `model` so it becomes `Available`.
    async fn acquire(&self, model: &str, progress: Option<ProgressFn>) -> Result<()>;

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Stream the response as text chunks.
    async fn stream(&self, request: &LlmRequest) -> Result<TokenStream>;
}

/// Result of text recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    /// Mean word confidence in percent, when the engine reports one.
    pub confidence: Option<f32>,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, image: &ImagePayload, progress: Option<ProgressFn>)
        -> Result<OcrOutput>;

    async fn availability(&self) -> Availability {
        Availability::Available
    }
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    async fn availability(&self) -> Availability;

    /// Candidates ordered by descending confidence.
    async fn detect(&self, text: &str) -> Result<Vec<DetectedLanguage>>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn pair_availability(&self, source: &str, target: &str) -> Availability;

    async fn translate(
        &self,
        source: &str,
        target: &str,
        text: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn acquire(&self, progress: Option<ProgressFn>) -> Result<()>;

    async fn summarize_stream(&self, text: &str, options: &SummaryOptions) -> Result<TokenStream>;
}

/// Approximate device position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in metres, if known.
    pub accuracy: Option<f64>,
    /// ISO 3166-1 alpha-2 code, if the lookup resolved one.
    pub country_code: Option<String>,
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<GeoPosition>;
}
