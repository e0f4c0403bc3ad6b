use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lecturebuddy_core::language::{base_language, is_known_language, language_name};
use lecturebuddy_core::{
    Availability, ChatRole, LlmMessage, LlmProvider, LlmRequest, ProgressFn, Translator,
};
use tracing::{debug, info};

/// Translator backed by a general chat model.
pub struct LlmTranslator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 2048,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

pub fn translation_prompt(source: &str, target: &str) -> String {
    format!(
        "You are a translation engine. Translate the user's text from {} to {}. \
Preserve line breaks, lists and technical terms. Output only the translation.",
        language_name(source),
        language_name(target)
    )
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn availability(&self) -> Availability {
        self.provider.availability(&self.model).await
    }

    async fn pair_availability(&self, source: &str, target: &str) -> Availability {
        if !is_known_language(source) || !is_known_language(target) {
            return Availability::Unavailable;
        }
        if base_language(source) == base_language(target) {
            return Availability::Unavailable;
        }
        self.provider.availability(&self.model).await
    }

    async fn translate(
        &self,
        source: &str,
        target: &str,
        text: &str,
        progress: Option<ProgressFn>,
    ) -> Result<String> {
        match self.pair_availability(source, target).await {
            Availability::Unavailable => anyhow::bail!(
                "The language pair ({} → {}) is not supported",
                source,
                target
            ),
            Availability::Downloadable => {
                info!(model = %self.model, "Downloading translation model");
                self.provider.acquire(&self.model, progress).await?;
            }
            Availability::Available | Availability::Downloading => {}
        }

        debug!(source, target, chars = text.len(), "Translating");
        let request = LlmRequest::new(&self.model)
            .with_system_prompt(translation_prompt(source, target))
            .with_message(LlmMessage::new(ChatRole::User, text))
            .with_limits(self.max_tokens, 0.1);
        let response = self.provider.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }
}
