use std::fmt;

use serde::{Deserialize, Serialize};

/// State reported by a capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Ready for use.
    Available,
    /// Supported, but the model must be acquired first.
    Downloadable,
    /// Acquisition in progress.
    Downloading,
    #[default]
    Unavailable,
}

impl Availability {
    pub fn is_ready(self) -> bool {
        self == Self::Available
    }

    /// Anything other than `Unavailable`.
    pub fn is_supported(self) -> bool {
        self != Self::Unavailable
    }

    pub fn needs_acquisition(self) -> bool {
        self == Self::Downloadable
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Downloadable => "downloadable",
            Self::Downloading => "downloading",
            Self::Unavailable => "unavailable",
        };
        write!(f, "{}", s)
    }
}

/// The on-device features the tools depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    LanguageModel,
    LanguageModelImage,
    Summarizer,
    LanguageDetector,
    Translator,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Self::LanguageModel,
        Self::LanguageModelImage,
        Self::Summarizer,
        Self::LanguageDetector,
        Self::Translator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::LanguageModel => "AI Chat",
            Self::LanguageModelImage => "AI Chat (images)",
            Self::Summarizer => "Summarizer",
            Self::LanguageDetector => "Language Detector",
            Self::Translator => "Translator",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unavailable() {
        assert_eq!(Availability::default(), Availability::Unavailable);
        assert!(!Availability::default().is_supported());
    }

    #[test]
    fn only_downloadable_needs_acquisition() {
        assert!(Availability::Downloadable.needs_acquisition());
        assert!(!Availability::Downloading.needs_acquisition());
        assert!(!Availability::Available.needs_acquisition());
        assert!(Availability::Downloading.is_supported());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(Availability::Downloadable.to_string(), "downloadable");
        assert_eq!(Capability::Summarizer.to_string(), "Summarizer");
    }
}
