pub mod availability;
pub mod error;
pub mod language;
pub mod message;
pub mod notice;
pub mod traits;
pub mod types;

pub use availability::{Availability, Capability};
pub use error::{BuddyError, DenyReason, InputRejection};
pub use message::{
    ChatMessage, ChatRole, ContextMode, DetectedLanguage, SummaryFormat, SummaryLength,
    SummaryOptions, SummaryType,
};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use traits::{
    GeoPosition, Geolocator, LanguageDetector, LlmMessage, LlmProvider, LlmRequest, LlmResponse,
    OcrEngine, OcrOutput, ProgressFn, Summarizer, TokenStream, Translator,
};
pub use types::{
    ImagePayload, ImageSource, InputData, InputKind, OptimizationMetadata, OptimizedData,
    WorkflowStep,
};
