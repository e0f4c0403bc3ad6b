use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lecturebuddy_core::{
    Availability, ChatRole, LlmMessage, LlmProvider, LlmRequest, ProgressFn, Summarizer,
    SummaryFormat, SummaryLength, SummaryOptions, SummaryType, TokenStream,
};
use tracing::debug;

const SHARED_CONTEXT: &str = "The text was extracted from lecture material such as slides, \
handouts or whiteboard notes. Summarize only what the text says.";

/// Summarizer backed by a general chat model.
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

fn type_instruction(kind: SummaryType, length: SummaryLength) -> String {
    match kind {
        SummaryType::KeyPoints => {
            let count = match length {
                SummaryLength::Short => 3,
                SummaryLength::Medium => 5,
                SummaryLength::Long => 7,
            };
            format!("List the {count} most important key points as bullet items.")
        }
        SummaryType::Tldr => {
            let sentences = match length {
                SummaryLength::Short => "one sentence",
                SummaryLength::Medium => "three sentences",
                SummaryLength::Long => "five sentences",
            };
            format!("Write a short, direct overview in {sentences}.")
        }
        SummaryType::Teaser => {
            let sentences = match length {
                SummaryLength::Short => "one sentence",
                SummaryLength::Medium => "three sentences",
                SummaryLength::Long => "five sentences",
            };
            format!(
                "Write an intriguing teaser in {sentences} that makes a student want to study the material."
            )
        }
        SummaryType::Headline => {
            let words = match length {
                SummaryLength::Short => 12,
                SummaryLength::Medium => 17,
                SummaryLength::Long => 22,
            };
            format!("Write a single headline of at most {words} words capturing the main idea.")
        }
    }
}

fn format_instruction(format: SummaryFormat) -> &'static str {
    match format {
        SummaryFormat::Markdown => "Format the output as Markdown.",
        SummaryFormat::PlainText => {
            "Output plain text only, without Markdown syntax such as #, * or backticks."
        }
    }
}

/// System prompt for one summarization run.
pub fn summary_prompt(options: &SummaryOptions) -> String {
    format!(
        "You are a summarizer. {} {} {} Reply with the summary only.",
        SHARED_CONTEXT,
        type_instruction(options.kind, options.length),
        format_instruction(options.format)
    )
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn availability(&self) -> Availability {
        self.provider.availability(&self.model).await
    }

    async fn acquire(&self, progress: Option<ProgressFn>) -> Result<()> {
        self.provider.acquire(&self.model, progress).await
    }

    async fn summarize_stream(&self, text: &str, options: &SummaryOptions) -> Result<TokenStream> {
        debug!(model = %self.model, ?options, chars = text.len(), "Summarizing");
        let request = LlmRequest::new(&self.model)
            .with_system_prompt(summary_prompt(options))
            .with_message(LlmMessage::new(ChatRole::User, text))
            .with_limits(self.max_tokens, 0.3);
        self.provider.stream(&request).await
    }
}
