//! Lecture Buddy runtime configuration.
//!
//! Provides:
//! - Typed config schema (models, OCR, polling, geolocation, camera)
//! - YAML loading from the config directory
//! - `${ENV_VAR}` substitution and `LECTUREBUDDY_*` overrides
//! - Default value application
//! - Validation with field paths

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::{BuddyConfig, ModelsConfig, OcrEngineKind, ProviderKind};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load a config file and run it through env substitution, overrides,
/// defaults and validation. Validation findings are logged, not fatal.
pub async fn load_and_prepare(path: &Path) -> Result<BuddyConfig> {
    let raw_config = load_config(path).await?;

    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    let config: BuddyConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides(config, |name| std::env::var(name).ok());
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok(config)
}
