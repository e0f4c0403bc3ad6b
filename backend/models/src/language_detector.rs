use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lecturebuddy_core::language::{base_language, is_known_language};
use lecturebuddy_core::{
    Availability, ChatRole, DetectedLanguage, LanguageDetector, LlmMessage, LlmProvider,
    LlmRequest,
};
use serde::Deserialize;

const DETECT_PROMPT: &str = "Identify the language of the user's text. Reply with a JSON array \
only, most likely first, of at most 5 objects shaped like {\"language\": \"<ISO 639-1 code>\", \
\"confidence\": <number between 0 and 1>}.";

/// Language identification backed by a general chat model.
pub struct LlmLanguageDetector {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmLanguageDetector {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawCandidate {
    language: String,
    #[serde(default)]
    confidence: f32,
}

/// Pull the candidate list out of a model reply, tolerating prose around it.
pub fn parse_candidates(reply: &str) -> Result<Vec<DetectedLanguage>> {
    let start = reply.find('[').context("No JSON array in detector reply")?;
    let end = reply.rfind(']').context("No JSON array in detector reply")?;
    if end < start {
        anyhow::bail!("No JSON array in detector reply");
    }
    let raw: Vec<RawCandidate> =
        serde_json::from_str(&reply[start..=end]).context("Malformed detector reply")?;

    let mut out: Vec<DetectedLanguage> = raw
        .into_iter()
        .filter(|c| is_known_language(&c.language) && c.confidence.is_finite())
        .map(|c| DetectedLanguage {
            language: base_language(&c.language),
            confidence: c.confidence.clamp(0.0, 1.0),
        })
        .collect();
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out.dedup_by(|later, earlier| later.language == earlier.language);
    Ok(out)
}

#[async_trait]
impl LanguageDetector for LlmLanguageDetector {
    async fn availability(&self) -> Availability {
        self.provider.availability(&self.model).await
    }

    async fn detect(&self, text: &str) -> Result<Vec<DetectedLanguage>> {
        let sample: String = text.chars().take(2000).collect();
        let request = LlmRequest::new(&self.model)
            .with_system_prompt(DETECT_PROMPT)
            .with_message(LlmMessage::new(ChatRole::User, sample))
            .with_limits(256, 0.0);
        let response = self.provider.complete(&request).await?;
        parse_candidates(&response.content)
    }
}
