//! Config defaults: fills unset or empty values after loading.

use crate::schema::{
    BuddyConfig, CapabilitiesConfig, GeolocationConfig, LoggingConfig, ModelsConfig, OcrConfig,
    OcrEngineKind, ProviderKind,
};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";
pub const DEFAULT_VISION_MODEL: &str = "llava";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

pub const DEFAULT_TESSERACT_BINARY: &str = "tesseract";
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Seconds between capability availability checks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

pub const DEFAULT_GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: BuddyConfig) -> BuddyConfig {
    let config = apply_logging_defaults(config);
    let config = apply_model_defaults(config);
    let config = apply_ocr_defaults(config);
    let config = apply_capability_defaults(config);
    apply_geolocation_defaults(config)
}

fn fill(slot: &mut Option<String>, value: &str) {
    if slot.as_deref().map_or(true, |s| s.trim().is_empty()) {
        *slot = Some(value.to_string());
    }
}

fn apply_logging_defaults(mut config: BuddyConfig) -> BuddyConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    fill(&mut logging.level, DEFAULT_LOG_LEVEL);
    config
}

/// Summarizer, translator and detector fall back to the chat model.
fn apply_model_defaults(mut config: BuddyConfig) -> BuddyConfig {
    let models = config.models.get_or_insert_with(ModelsConfig::default);
    models.provider.get_or_insert(ProviderKind::Ollama);
    fill(&mut models.base_url, DEFAULT_OLLAMA_URL);
    fill(&mut models.chat_model, DEFAULT_CHAT_MODEL);
    fill(&mut models.vision_model, DEFAULT_VISION_MODEL);

    let chat = models
        .chat_model
        .clone()
        .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
    fill(&mut models.summarizer_model, &chat);
    fill(&mut models.translator_model, &chat);
    fill(&mut models.detector_model, &chat);

    if models.temperature.map_or(true, |t| !t.is_finite()) {
        models.temperature = Some(DEFAULT_TEMPERATURE);
    }
    if models.max_tokens.map_or(true, |t| t == 0) {
        models.max_tokens = Some(DEFAULT_MAX_TOKENS);
    }
    config
}

fn apply_ocr_defaults(mut config: BuddyConfig) -> BuddyConfig {
    let ocr = config.ocr.get_or_insert_with(OcrConfig::default);
    ocr.engine.get_or_insert(OcrEngineKind::Tesseract);
    fill(&mut ocr.binary, DEFAULT_TESSERACT_BINARY);
    fill(&mut ocr.language, DEFAULT_OCR_LANGUAGE);
    config
}

fn apply_capability_defaults(mut config: BuddyConfig) -> BuddyConfig {
    let caps = config
        .capabilities
        .get_or_insert_with(CapabilitiesConfig::default);
    if caps.poll_interval_secs.map_or(true, |s| s == 0) {
        caps.poll_interval_secs = Some(DEFAULT_POLL_INTERVAL_SECS);
    }
    config
}

fn apply_geolocation_defaults(mut config: BuddyConfig) -> BuddyConfig {
    let geo = config
        .geolocation
        .get_or_insert_with(GeolocationConfig::default);
    geo.enabled.get_or_insert(true);
    fill(&mut geo.endpoint, DEFAULT_GEO_ENDPOINT);
    config
}
