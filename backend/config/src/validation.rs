//! Config validation: checks run after defaults, with field paths in every message.

use crate::schema::{BuddyConfig, OcrEngineKind, ProviderKind};
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &BuddyConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_logging(config, &mut report);
    validate_models(config, &mut report);
    validate_ocr(config, &mut report);
    validate_geolocation(config, &mut report);
    validate_camera(config, &mut report);
    report
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    (url.starts_with("http://") || url.starts_with("https://")) && !url.ends_with("://")
}

fn validate_logging(config: &BuddyConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of: {}", LOG_LEVELS.join(", ")),
        );
    }
}

fn validate_models(config: &BuddyConfig, report: &mut ValidationReport) {
    let Some(models) = &config.models else { return };
    if let Some(url) = &models.base_url {
        if !is_http_url(url) && config.provider() == ProviderKind::Ollama {
            report.error("models.baseUrl", format!("'{url}' is not an http(s) URL"));
        }
    }
    if let Some(t) = models.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("models.temperature", "temperature must be between 0.0 and 2.0");
        }
    }
    for (path, name) in [
        ("models.chatModel", &models.chat_model),
        ("models.visionModel", &models.vision_model),
        ("models.summarizerModel", &models.summarizer_model),
        ("models.translatorModel", &models.translator_model),
        ("models.detectorModel", &models.detector_model),
    ] {
        if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            report.error(path, "Model name cannot be empty");
        }
    }
}

fn validate_ocr(config: &BuddyConfig, report: &mut ValidationReport) {
    let Some(ocr) = &config.ocr else { return };
    if let Some(lang) = &ocr.language {
        let valid = !lang.is_empty()
            && lang
                .split('+')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        if !valid {
            report.error(
                "ocr.language",
                format!("'{lang}' is not a Tesseract language list such as 'eng' or 'eng+deu'"),
            );
        }
    }
    if config.ocr_engine() == OcrEngineKind::Vision {
        let has_vision_model = config
            .models
            .as_ref()
            .and_then(|m| m.vision_model.as_deref())
            .is_some_and(|m| !m.trim().is_empty());
        if !has_vision_model {
            report.error("ocr.engine", "The vision OCR engine needs models.visionModel");
        }
    }
}

fn validate_geolocation(config: &BuddyConfig, report: &mut ValidationReport) {
    let Some(geo) = &config.geolocation else { return };
    if geo.enabled == Some(false) {
        return;
    }
    if let Some(endpoint) = &geo.endpoint {
        if !is_http_url(endpoint) {
            report.error("geolocation.endpoint", format!("'{endpoint}' is not an http(s) URL"));
        }
    }
}

fn validate_camera(config: &BuddyConfig, report: &mut ValidationReport) {
    let Some(camera) = &config.camera else { return };
    if camera.command.as_ref().is_some_and(Vec::is_empty) {
        report.warn("camera.command", "Empty camera command; the camera source is disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{CameraConfig, LoggingConfig, ModelsConfig, OcrConfig};

    #[test]
    fn defaulted_config_is_valid() {
        let report = validate(&apply_all_defaults(BuddyConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn rejects_unknown_log_level_and_bad_url() {
        let mut cfg = BuddyConfig::default();
        cfg.logging = Some(LoggingConfig {
            level: Some("verbose".into()),
            ..Default::default()
        });
        cfg.models = Some(ModelsConfig {
            base_url: Some("localhost:11434".into()),
            temperature: Some(3.5),
            ..Default::default()
        });
        let report = validate(&cfg);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["logging.level", "models.baseUrl", "models.temperature"]);
    }

    #[test]
    fn vision_engine_requires_vision_model() {
        let mut cfg = BuddyConfig::default();
        cfg.ocr = Some(OcrConfig {
            engine: Some(OcrEngineKind::Vision),
            language: Some("eng+deu".into()),
            ..Default::default()
        });
        cfg.models = Some(ModelsConfig {
            vision_model: Some(" ".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "ocr.engine"));
        assert!(!report.errors.iter().any(|e| e.path == "ocr.language"));
    }

    #[test]
    fn empty_camera_command_is_a_warning() {
        let mut cfg = BuddyConfig::default();
        cfg.camera = Some(CameraConfig { command: Some(vec![]) });
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "camera.command");
    }
}
