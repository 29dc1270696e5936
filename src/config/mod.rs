//! Application configuration

pub mod file;
pub mod prompts;

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::providers::GeminiConfig;

pub use file::{ConfigError, FileConfig};
pub use prompts::builtin as prompts_builtin;

const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent",
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent",
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub provider: ProviderConfig,
    pub chat: ChatConfig,
    pub countries_url: String,
}

/// Generative provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Generation endpoints, tried in order
    pub endpoints: Vec<String>,
    pub models_url: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            models_url: self.models_url.clone(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            timeout_secs: self.timeout_secs,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let gemini = GeminiConfig::default();
        Self {
            api_key: None,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            models_url: gemini.models_url,
            max_output_tokens: gemini.max_output_tokens,
            temperature: gemini.temperature,
            timeout_secs: gemini.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub page_size: usize,
    pub page_delay_ms: u64,
    /// The one accepted login code
    pub demo_otp: String,
    pub fallback_replies: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            page_delay_ms: 0,
            demo_otp: "123456".to_string(),
            fallback_replies: prompts::default_fallback_replies(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            provider: ProviderConfig::default(),
            chat: ChatConfig::default(),
            countries_url: "https://restcountries.com/v3.1/all".to_string(),
        }
    }
}

impl Config {
    /// Build configuration from the environment, then the optional
    /// `CHAT_CONFIG` TOML file on top
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var("PORT") {
            config.port = port;
        }
        if let Ok(dir) = env::var("CHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        let provider = &mut config.provider;
        provider.api_key = env::var("GEMINI_API_KEY").ok();
        if let Ok(endpoints) = env::var("GEMINI_ENDPOINTS") {
            provider.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(url) = env::var("GEMINI_MODELS_URL") {
            provider.models_url = url;
        }
        if let Some(tokens) = parse_var("GEMINI_MAX_OUTPUT_TOKENS") {
            provider.max_output_tokens = tokens;
        }
        if let Some(temperature) = parse_var("GEMINI_TEMPERATURE") {
            provider.temperature = temperature;
        }
        if let Some(secs) = parse_var("GEMINI_TIMEOUT_SECS") {
            provider.timeout_secs = secs;
        }

        if let Some(delay) = parse_var("PAGE_DELAY_MS") {
            config.chat.page_delay_ms = delay;
        }
        if let Ok(url) = env::var("COUNTRIES_URL") {
            config.countries_url = url;
        }

        if let Ok(path) = env::var("CHAT_CONFIG") {
            FileConfig::from_file(Path::new(&path))?.apply(&mut config)?;
            tracing::info!(path = %path, "Loaded configuration file");
        }

        if config.provider.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set, every reply will use the fallback set");
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
