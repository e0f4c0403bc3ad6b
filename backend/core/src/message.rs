use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One entry in the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// What the chat assistant is given as lecture context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Optimized text only.
    Text,
    /// Original image only.
    Image,
    #[default]
    Both,
}

impl ContextMode {
    pub fn uses_image(self) -> bool {
        matches!(self, Self::Image | Self::Both)
    }

    pub fn uses_text(self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryType {
    #[default]
    KeyPoints,
    Tldr,
    Teaser,
    Headline,
}

impl SummaryType {
    pub const ALL: [SummaryType; 4] = [Self::KeyPoints, Self::Tldr, Self::Teaser, Self::Headline];

    pub fn label(self) -> &'static str {
        match self {
            Self::KeyPoints => "Key Points",
            Self::Tldr => "TL;DR",
            Self::Teaser => "Teaser",
            Self::Headline => "Headline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    PlainText,
}

impl SummaryFormat {
    /// File name used when exporting a summary.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Markdown => "summary.md",
            Self::PlainText => "summary.txt",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// Options for one summarization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryOptions {
    #[serde(rename = "type")]
    pub kind: SummaryType,
    pub format: SummaryFormat,
    pub length: SummaryLength,
}

/// One candidate from language detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLanguage {
    /// BCP-47 / ISO 639-1 code, e.g. `en`.
    pub language: String,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_options_default() {
        let opts = SummaryOptions::default();
        assert_eq!(opts.kind, SummaryType::KeyPoints);
        assert_eq!(opts.format, SummaryFormat::Markdown);
        assert_eq!(opts.length, SummaryLength::Medium);
    }

    #[test]
    fn summary_options_use_kebab_case() {
        let json = serde_json::to_value(SummaryOptions {
            kind: SummaryType::KeyPoints,
            format: SummaryFormat::PlainText,
            length: SummaryLength::Short,
        })
        .unwrap();
        assert_eq!(json["type"], "key-points");
        assert_eq!(json["format"], "plain-text");
        assert_eq!(json["length"], "short");
    }

    #[test]
    fn export_names_follow_format() {
        assert_eq!(SummaryFormat::Markdown.file_name(), "summary.md");
        assert_eq!(SummaryFormat::PlainText.mime_type(), "text/plain");
    }

    #[test]
    fn chat_messages_get_unique_ids() {
        let a = ChatMessage::user("hi");
        let b = ChatMessage::user("hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.role, ChatRole::User);
    }
}
