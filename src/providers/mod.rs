//! Generative-language provider integrations

mod gemini;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiClient, GeminiConfig};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider rejected the credential")]
    AuthInvalid,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether further endpoints should be skipped for this request
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }
}

/// A single-shot content generation client.
///
/// Implementations make one request per call; retry across endpoints is
/// left to the caller.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Lightweight credential check
    async fn probe(&self) -> Result<(), ProviderError>;

    /// Generate a reply for `prompt` against one endpoint
    async fn generate(&self, endpoint: &str, prompt: &str) -> Result<String, ProviderError>;
}
