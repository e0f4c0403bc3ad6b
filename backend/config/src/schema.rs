//! Lecture Buddy runtime configuration schema.
//!
//! Every field is optional in the file; `apply_all_defaults` fills the gaps
//! and the accessors below read the filled-in values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::defaults;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuddyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Local model backend and model names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrConfig>,

    /// Availability polling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilitiesConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeolocationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraConfig>,

    /// Where preferences are kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Log directory; relative paths resolve against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    /// In-process canned responses, for demos and tests.
    Mock,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown provider '{other}'; use 'ollama' or 'mock'")),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,
    /// Image-capable model, used for chat with images and vision OCR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarizer_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translator_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// OCR
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    Tesseract,
    Vision,
}

impl FromStr for OcrEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "vision" => Ok(Self::Vision),
            other => Err(format!("unknown OCR engine '{other}'; use 'tesseract' or 'vision'")),
        }
    }
}

impl fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tesseract => "tesseract",
            Self::Vision => "vision",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<OcrEngineKind>,
    /// Tesseract executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    /// Tesseract language pack, e.g. `eng` or `eng+deu`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

// ---------------------------------------------------------------------------
// Capabilities, geolocation, camera, storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    /// Command that writes one PNG frame to stdout. Empty disables the camera.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Preference directory; relative paths resolve against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved accessors
// ---------------------------------------------------------------------------

fn resolve_dir(base: &Path, configured: Option<&str>) -> Option<PathBuf> {
    let dir = configured.map(str::trim).filter(|d| !d.is_empty())?;
    let dir = match dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(dir)),
        None => PathBuf::from(dir),
    };
    Some(if dir.is_absolute() { dir } else { base.join(dir) })
}

impl BuddyConfig {
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(defaults::DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        let configured = self.logging.as_ref().and_then(|l| l.dir.as_deref());
        resolve_dir(config_dir, configured).unwrap_or_else(|| config_dir.join(defaults::DEFAULT_LOG_DIR))
    }

    pub fn storage_dir(&self, config_dir: &Path) -> PathBuf {
        let configured = self.storage.as_ref().and_then(|s| s.dir.as_deref());
        resolve_dir(config_dir, configured).unwrap_or_else(|| config_dir.to_path_buf())
    }

    pub fn models(&self) -> ModelsConfig {
        self.models.clone().unwrap_or_default()
    }

    pub fn provider(&self) -> ProviderKind {
        self.models
            .as_ref()
            .and_then(|m| m.provider)
            .unwrap_or(ProviderKind::Ollama)
    }

    pub fn ocr_engine(&self) -> OcrEngineKind {
        self.ocr
            .as_ref()
            .and_then(|o| o.engine)
            .unwrap_or(OcrEngineKind::Tesseract)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        let secs = self
            .capabilities
            .as_ref()
            .and_then(|c| c.poll_interval_secs)
            .filter(|s| *s > 0)
            .unwrap_or(defaults::DEFAULT_POLL_INTERVAL_SECS);
        std::time::Duration::from_secs(secs)
    }

    pub fn geolocation_endpoint(&self) -> Option<&str> {
        let geo = self.geolocation.as_ref()?;
        if geo.enabled == Some(false) {
            return None;
        }
        geo.endpoint.as_deref().filter(|e| !e.is_empty())
    }

    pub fn camera_command(&self) -> Option<&[String]> {
        self.camera
            .as_ref()
            .and_then(|c| c.command.as_deref())
            .filter(|argv| !argv.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
models:
  provider: mock
  chatModel: llama3.2
  maxTokens: 512
ocr:
  engine: vision
capabilities:
  pollIntervalSecs: 5
camera:
  command: ["fswebcam", "--png", "9", "-"]
"#;
        let config: BuddyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider(), ProviderKind::Mock);
        assert_eq!(config.models().max_tokens, Some(512));
        assert_eq!(config.ocr_engine(), OcrEngineKind::Vision);
        assert_eq!(config.poll_interval().as_secs(), 5);
        assert_eq!(config.camera_command().unwrap()[0], "fswebcam");
    }

    #[test]
    fn directories_resolve_against_config_dir() {
        let base = Path::new("/etc/lecturebuddy");
        let mut config = BuddyConfig::default();
        assert_eq!(config.log_dir(base), base.join("logs"));
        assert_eq!(config.storage_dir(base), base.to_path_buf());

        config.logging = Some(LoggingConfig {
            dir: Some("/var/log/lb".into()),
            ..Default::default()
        });
        assert_eq!(config.log_dir(base), PathBuf::from("/var/log/lb"));
    }

    #[test]
    fn disabled_geolocation_has_no_endpoint() {
        let mut config = BuddyConfig::default();
        config.geolocation = Some(GeolocationConfig {
            enabled: Some(false),
            endpoint: Some("http://ip-api.com/json".into()),
        });
        assert!(config.geolocation_endpoint().is_none());
    }

    #[test]
    fn provider_from_str() {
        assert_eq!(" Ollama ".parse::<ProviderKind>(), Ok(ProviderKind::Ollama));
        assert!("openai".parse::<ProviderKind>().is_err());
    }
}
