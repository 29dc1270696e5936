//! Optional TOML configuration file
//!
//! Every field is optional; values present in the file override the ones
//! taken from the environment.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! data_dir = "/var/lib/chatroom-ai"
//!
//! [provider]
//! api_key_env = "GEMINI_API_KEY"
//! endpoints = ["https://.../gemini-2.0-flash:generateContent"]
//! timeout_secs = 5
//!
//! [chat]
//! page_size = 20
//! page_delay_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Config;

/// Root of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub provider: ProviderSection,

    #[serde(default)]
    pub chat: ChatSection,

    #[serde(default)]
    pub countries: CountriesSection,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay the values present in this file onto `config`
    pub fn apply(self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(host) = self.server.host {
            config.host = host;
        }
        if let Some(port) = self.server.port {
            config.port = port;
        }

        if let Some(dir) = self.storage.data_dir {
            config.data_dir = dir;
        }

        let provider = &mut config.provider;
        if let Some(var) = self.provider.api_key_env {
            provider.api_key = std::env::var(&var).ok();
        }
        if let Some(endpoints) = self.provider.endpoints {
            provider.endpoints = endpoints;
        }
        if let Some(url) = self.provider.models_url {
            provider.models_url = url;
        }
        if let Some(tokens) = self.provider.max_output_tokens {
            provider.max_output_tokens = tokens;
        }
        if let Some(temperature) = self.provider.temperature {
            provider.temperature = temperature;
        }
        if let Some(secs) = self.provider.timeout_secs {
            provider.timeout_secs = secs;
        }

        let chat = &mut config.chat;
        if let Some(size) = self.chat.page_size {
            chat.page_size = size;
        }
        if let Some(delay) = self.chat.page_delay_ms {
            chat.page_delay_ms = delay;
        }
        if let Some(code) = self.chat.demo_otp {
            chat.demo_otp = code;
        }
        if let Some(replies) = self.chat.fallback_replies {
            if replies.is_empty() {
                return Err(ConfigError::Validation(
                    "chat.fallback_replies must not be empty".to_string(),
                ));
            }
            chat.fallback_replies = replies;
        }

        if let Some(url) = self.countries.url {
            config.countries_url = url;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory holding the SQLite database
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Generative provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Generation endpoints, tried in order
    #[serde(default)]
    pub endpoints: Option<Vec<String>>,

    #[serde(default)]
    pub models_url: Option<String>,

    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Per-endpoint timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSection {
    #[serde(default)]
    pub page_size: Option<usize>,

    /// Delay before serving a page of history
    #[serde(default)]
    pub page_delay_ms: Option<u64>,

    #[serde(default)]
    pub demo_otp: Option<String>,

    #[serde(default)]
    pub fallback_replies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountriesSection {
    #[serde(default)]
    pub url: Option<String>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
