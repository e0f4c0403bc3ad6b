pub mod chat;
pub mod poller;
pub mod summarizer;
pub mod translator;

pub use chat::{system_prompt, ChatModels, ChatTool};
pub use poller::{
    check_all, CapabilityPoller, CapabilityProbe, DetectorProbe, LanguageModelProbe, PollerHandle,
    SummarizerProbe, TranslatorProbe, DEFAULT_POLL_INTERVAL,
};
pub use summarizer::SummarizerTool;
pub use translator::{TargetCandidate, TranslatorState, TranslatorTool, MIN_DETECTION_CONFIDENCE};
