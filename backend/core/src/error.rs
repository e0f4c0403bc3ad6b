use thiserror::Error;

use crate::availability::Capability;

/// Top-level error type for the Lecture Buddy runtime.
#[derive(Debug, Error)]
pub enum BuddyError {
    #[error("{0}")]
    InputRejected(#[from] InputRejection),

    #[error("{capability} is not available")]
    CapabilityUnavailable { capability: Capability },

    #[error("{operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a piece of input was refused. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputRejection {
    #[error("File must be an image")]
    NotAnImage,

    #[error("Image must be smaller than 10MB")]
    ImageTooLarge,

    #[error("Text cannot be empty")]
    EmptyText,

    #[error("Text must be shorter than 50000 characters")]
    TextTooLong,
}

/// Why a navigation request was denied. `Display` is the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("Step is currently processing")]
    StepLocked,

    #[error("Please provide input first")]
    NoInput,

    #[error("Data optimization is still processing")]
    OptimizerProcessing,

    #[error("Please process data first")]
    NotOptimized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_are_user_facing() {
        assert_eq!(InputRejection::NotAnImage.to_string(), "File must be an image");
        assert_eq!(
            InputRejection::TextTooLong.to_string(),
            "Text must be shorter than 50000 characters"
        );
        let err: BuddyError = InputRejection::EmptyText.into();
        assert_eq!(err.to_string(), "Text cannot be empty");
    }

    #[test]
    fn capability_error_names_capability() {
        let err = BuddyError::CapabilityUnavailable {
            capability: Capability::Summarizer,
        };
        assert_eq!(err.to_string(), "Summarizer is not available");
    }
}
