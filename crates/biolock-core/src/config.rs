//! Guard configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capability::{ChallengeRequest, Modality};
use crate::error::ConfigError;
use crate::store::BIOMETRIC_ENABLED_KEY;

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration directory under the platform config dir
const CONFIG_DIR_NAME: &str = "biolock";

/// Guard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Store key holding the enabled flag
    #[serde(default = "default_store_key")]
    pub store_key: String,

    /// Prompt shown for the proof-of-possession challenge when enabling
    #[serde(default = "default_enable_prompt")]
    pub enable_prompt: String,

    /// Prompt shown when unlocking; `{modality}` is replaced with the
    /// lowercased modality name
    #[serde(default = "default_unlock_prompt")]
    pub unlock_prompt: String,

    /// Label for the platform passcode fallback
    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,

    /// Let the platform offer its passcode fallback
    #[serde(default = "default_allow_device_fallback")]
    pub allow_device_fallback: bool,
}

fn default_store_key() -> String {
    BIOMETRIC_ENABLED_KEY.to_string()
}

fn default_enable_prompt() -> String {
    "Authenticate to enable app lock".to_string()
}

fn default_unlock_prompt() -> String {
    "Unlock app with your {modality}".to_string()
}

fn default_fallback_label() -> String {
    "Use passcode".to_string()
}

fn default_allow_device_fallback() -> bool {
    true
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            store_key: default_store_key(),
            enable_prompt: default_enable_prompt(),
            unlock_prompt: default_unlock_prompt(),
            fallback_label: default_fallback_label(),
            allow_device_fallback: default_allow_device_fallback(),
        }
    }
}

impl GuardConfig {
    /// Platform config location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Request used for the enable proof-of-possession step
    pub fn enable_request(&self) -> ChallengeRequest {
        self.request(self.enable_prompt.clone())
    }

    /// Request used for unlocking with the given modality
    pub fn unlock_request(&self, modality: Option<Modality>) -> ChallengeRequest {
        let name = modality.unwrap_or(Modality::Generic).display_name();
        let prompt = self
            .unlock_prompt
            .replace("{modality}", &name.to_lowercase());
        self.request(prompt)
    }

    fn request(&self, prompt: String) -> ChallengeRequest {
        ChallengeRequest {
            prompt,
            fallback_label: self.fallback_label.clone(),
            allow_device_fallback: self.allow_device_fallback,
        }
    }
}
