use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocketError, Result};

/// Top-level configuration for Docket.
///
/// Loaded from `~/.docket/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocketConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl DocketConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocketConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocketError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.docket/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Dialogue engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Minimum classifier confidence for a message to start an action flow.
    pub confidence_threshold: f64,
    /// Case-insensitive substrings that abort an in-flight action.
    pub cancel_keywords: Vec<String>,
    /// Longest accepted message, in characters.
    pub max_message_length: usize,
    /// Run turns of the same conversation one at a time.
    pub serialize_turns: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            cancel_keywords: [
                "cancel",
                "stop",
                "quit",
                "exit",
                "nevermind",
                "never mind",
                "abort",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_message_length: 4000,
            serialize_turns: true,
        }
    }
}

/// Hosted language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the generative language API.
    pub endpoint: String,
    /// Model name used for both intent detection and replies.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature for general replies.
    pub temperature: f32,
    /// Output token cap for general replies.
    pub max_output_tokens: u32,
    /// HTTP timeout per request.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemma-3-4b-it".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.7,
            max_output_tokens: 2000,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name inside `general.data_dir`.
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "docket.db".to_string(),
        }
    }
}
