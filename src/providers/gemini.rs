//! Google generative-language (Gemini) provider
//!
//! Speaks the `generateContent` REST format. The API key travels as the
//! `key` query parameter on every request.
//!
//! # Configuration
//!
//! ```toml
//! [provider]
//! endpoints = [
//!     "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent",
//! ]
//! max_output_tokens = 1000
//! temperature = 0.7
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerativeClient, ProviderError};

/// Generation request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

/// Generation response, only the fields we read
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key, sent as the `key` query parameter
    pub api_key: Option<String>,
    /// Model listing URL used to check the key
    pub models_url: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Timeout for each request, in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            max_output_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 10,
        }
    }
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn probe(&self) -> Result<(), ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::AuthInvalid)?;

        let response = self
            .client
            .get(&self.config.models_url)
            .query(&[("key", api_key)])
            .send()
            .await?;

        tracing::debug!(status = %response.status(), "Credential probe response");

        if !response.status().is_success() {
            return Err(ProviderError::AuthInvalid);
        }

        Ok(())
    }

    async fn generate(&self, endpoint: &str, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::AuthInvalid)?;

        let response = self
            .client
            .post(endpoint)
            .query(&[("key", api_key)])
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        extract_reply(&body)
    }
}

/// Pull the first candidate's text out of a response body
fn extract_reply(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse response: {} - Body: {}", e, body))
    })?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| ProviderError::InvalidResponse("No candidate text in response".to_string()))
}
