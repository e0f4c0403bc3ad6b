use std::fmt;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stage of the three-step wizard. Declaration order is the progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Input,
    Optimizer,
    Tools,
}

impl WorkflowStep {
    /// The fixed step sequence.
    pub const ALL: [WorkflowStep; 3] = [Self::Input, Self::Optimizer, Self::Tools];

    pub fn index(self) -> usize {
        match self {
            Self::Input => 0,
            Self::Optimizer => 1,
            Self::Tools => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Human-readable label used by the step indicator.
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Optimizer => "Data Optimization",
            Self::Tools => "Tools",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Optimizer => "optimizer",
            Self::Tools => "tools",
        };
        write!(f, "{}", s)
    }
}

/// Which capture mode the user picked on the input step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Image,
    Text,
}

/// Where an image input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Upload,
    Camera,
}

/// Captured user input. Replaced wholesale on re-capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputData {
    Text {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Image {
        /// `data:<mime>;base64,<payload>` URI.
        data: String,
        source: ImageSource,
        timestamp: DateTime<Utc>,
    },
    /// Declared for parity with the capture model; no component produces it.
    Audio {
        data: Vec<u8>,
        timestamp: DateTime<Utc>,
    },
}

impl InputData {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn image(data: impl Into<String>, source: ImageSource) -> Self {
        Self::Image {
            data: data.into(),
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> Option<InputKind> {
        match self {
            Self::Text { .. } => Some(InputKind::Text),
            Self::Image { .. } => Some(InputKind::Image),
            Self::Audio { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Text { timestamp, .. }
            | Self::Image { timestamp, .. }
            | Self::Audio { timestamp, .. } => *timestamp,
        }
    }

    /// The image data URI, if this is an image input.
    pub fn image_data(&self) -> Option<&str> {
        match self {
            Self::Image { data, .. } => Some(data),
            _ => None,
        }
    }

    /// True when both inputs carry the same payload, ignoring capture time.
    pub fn same_content(&self, other: &InputData) -> bool {
        match (self, other) {
            (Self::Text { content: a, .. }, Self::Text { content: b, .. }) => a == b,
            (Self::Image { data: a, .. }, Self::Image { data: b, .. }) => a == b,
            (Self::Audio { data: a, .. }, Self::Audio { data: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Provenance attached to optimized text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f32>,
    /// Wall-clock duration of the optimization run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_manually: Option<bool>,
}

/// Text produced by the optimizer step, tied to the input it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedData {
    pub original_input: InputData,
    pub processed_text: String,
    #[serde(default)]
    pub metadata: OptimizationMetadata,
}

impl OptimizedData {
    /// Passthrough for text input: the content is already usable.
    pub fn passthrough(input: &InputData) -> Self {
        let processed_text = match input {
            InputData::Text { content, .. } => content.clone(),
            _ => String::new(),
        };
        Self {
            original_input: input.clone(),
            processed_text,
            metadata: OptimizationMetadata {
                edited_manually: Some(false),
                ..Default::default()
            },
        }
    }

    pub fn matches_input(&self, input: &InputData) -> bool {
        self.original_input.same_content(input)
    }
}

/// Decoded image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("not a data URI"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("data URI has no payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("data URI is not base64 encoded"))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .context("Failed to decode data URI payload")?;
        Ok(Self::new(mime_type, bytes))
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_sequence_is_linear() {
        assert_eq!(WorkflowStep::Input.next(), Some(WorkflowStep::Optimizer));
        assert_eq!(WorkflowStep::Tools.next(), None);
        assert_eq!(WorkflowStep::Input.previous(), None);
        assert_eq!(WorkflowStep::Tools.previous(), Some(WorkflowStep::Optimizer));
        assert!(WorkflowStep::Input < WorkflowStep::Tools);
    }

    #[test]
    fn step_display_matches_serde() {
        for step in WorkflowStep::ALL {
            let json = serde_json::to_value(step).unwrap();
            assert_eq!(json.as_str().unwrap(), step.to_string());
        }
    }

    #[test]
    fn input_data_is_tagged() {
        let input = InputData::image("data:image/png;base64,AAAA", ImageSource::Camera);
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["source"], "camera");
    }

    #[test]
    fn same_content_ignores_timestamp() {
        let a = InputData::text("hello");
        let b = InputData::text("hello");
        let c = InputData::text("other");
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
        assert!(!a.same_content(&InputData::image("hello", ImageSource::Upload)));
    }

    #[test]
    fn passthrough_copies_text() {
        let input = InputData::text("lecture notes");
        let optimized = OptimizedData::passthrough(&input);
        assert_eq!(optimized.processed_text, "lecture notes");
        assert_eq!(optimized.metadata.edited_manually, Some(false));
        assert!(optimized.matches_input(&input));
    }

    #[test]
    fn data_uri_parses() {
        let payload = ImagePayload::new("image/png", vec![1, 2, 3, 4]);
        let uri = payload.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(ImagePayload::from_data_uri(&uri).unwrap(), payload);
    }

    #[test]
    fn data_uri_rejects_garbage() {
        assert!(ImagePayload::from_data_uri("hello").is_err());
        assert!(ImagePayload::from_data_uri("data:image/png,plain").is_err());
    }
}
