pub mod language_detector;
pub mod ndjson;
pub mod providers;
pub mod summarizer;
pub mod translator;

pub use language_detector::LlmLanguageDetector;
pub use providers::mock::MockProvider;
pub use providers::ollama::OllamaProvider;
pub use summarizer::LlmSummarizer;
pub use translator::LlmTranslator;
