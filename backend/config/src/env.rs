//! Environment handling for config values.
//!
//! `${VAR_NAME}` references in string values are resolved at load time; only
//! uppercase `[A-Z_][A-Z0-9_]*` names match and `$${VAR}` stays literal.
//! A handful of `LECTUREBUDDY_*` variables override fields after loading.

use crate::schema::{BuddyConfig, LoggingConfig, ModelsConfig, OcrConfig};
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

/// Matches `${VAR}` and the escaped form `$${VAR}`.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern"));

pub const ENV_OLLAMA_URL: &str = "LECTUREBUDDY_OLLAMA_URL";
pub const ENV_PROVIDER: &str = "LECTUREBUDDY_PROVIDER";
pub const ENV_LOG_LEVEL: &str = "LECTUREBUDDY_LOG_LEVEL";
pub const ENV_OCR_ENGINE: &str = "LECTUREBUDDY_OCR_ENGINE";

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, |name| std::env::var(name).ok())
}

/// Substitute `${VAR}` references using `lookup`. Unset or empty variables
/// are an error.
pub fn resolve_env_vars_with(value: &Value, lookup: impl Fn(&str) -> Option<String>) -> Result<Value> {
    substitute_value(value, &lookup, "")
}

fn substitute_value(value: &Value, lookup: &dyn Fn(&str) -> Option<String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, lookup, path)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, lookup, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                out.insert(k.clone(), substitute_value(v, lookup, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, lookup: &dyn Fn(&str) -> Option<String>, path: &str) -> Result<String> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }
    let mut missing: Option<String> = None;
    let out = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let whole = &caps[0];
        if let Some(escaped) = whole.strip_prefix("$$") {
            return format!("${escaped}");
        }
        match lookup(&caps[1]).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });
    if let Some(var_name) = missing {
        bail!(MissingEnvVarError {
            var_name,
            config_path: path.to_string(),
        });
    }
    Ok(out.into_owned())
}

/// Apply `LECTUREBUDDY_*` overrides. Values that fail to parse are ignored.
pub fn apply_env_overrides(mut config: BuddyConfig, lookup: impl Fn(&str) -> Option<String>) -> BuddyConfig {
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = get(ENV_OLLAMA_URL) {
        config.models.get_or_insert_with(ModelsConfig::default).base_url = Some(url);
    }
    if let Some(provider) = get(ENV_PROVIDER) {
        match provider.parse() {
            Ok(kind) => config.models.get_or_insert_with(ModelsConfig::default).provider = Some(kind),
            Err(e) => debug!(var = ENV_PROVIDER, error = %e, "Ignoring override"),
        }
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(level);
    }
    if let Some(engine) = get(ENV_OCR_ENGINE) {
        match engine.parse() {
            Ok(kind) => config.ocr.get_or_insert_with(OcrConfig::default).engine = Some(kind),
            Err(e) => debug!(var = ENV_OCR_ENGINE, error = %e, "Ignoring override"),
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{OcrEngineKind, ProviderKind};
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn substitutes_nested_strings() {
        let value = json!({ "models": { "baseUrl": "http://${HOST}:11434" }, "camera": { "command": ["${CAM}"] } });
        let out = resolve_env_vars_with(&value, env(&[("HOST", "gpu-box"), ("CAM", "fswebcam")])).unwrap();
        assert_eq!(out["models"]["baseUrl"], "http://gpu-box:11434");
        assert_eq!(out["camera"]["command"][0], "fswebcam");
    }

    #[test]
    fn missing_var_reports_path() {
        let value = json!({ "models": { "baseUrl": "${NOPE}" } });
        let err = resolve_env_vars_with(&value, env(&[])).unwrap_err();
        let err = err.downcast::<MissingEnvVarError>().unwrap();
        assert_eq!(err.var_name, "NOPE");
        assert_eq!(err.config_path, "models.baseUrl");
    }

    #[test]
    fn escaped_reference_stays_literal() {
        let value = json!("cost $${PRICE}");
        let out = resolve_env_vars_with(&value, env(&[])).unwrap();
        assert_eq!(out, json!("cost ${PRICE}"));
    }

    #[test]
    fn lowercase_names_are_not_references() {
        let value = json!("${lower}");
        assert_eq!(resolve_env_vars_with(&value, env(&[])).unwrap(), value);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let config = apply_env_overrides(
            BuddyConfig::default(),
            env(&[
                (ENV_OLLAMA_URL, "http://10.0.0.2:11434"),
                (ENV_PROVIDER, "mock"),
                (ENV_OCR_ENGINE, "paper"),
                (ENV_LOG_LEVEL, " debug "),
            ]),
        );
        assert_eq!(config.provider(), ProviderKind::Mock);
        assert_eq!(config.models().base_url.as_deref(), Some("http://10.0.0.2:11434"));
        assert_eq!(config.ocr_engine(), OcrEngineKind::Tesseract);
        assert_eq!(config.log_level(), "debug");
    }
}
