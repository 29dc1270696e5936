//! AI reply gateway
//!
//! Turns one user message into one reply string. The provider is asked
//! statelessly (no prior turns are sent), every endpoint failure is
//! absorbed, and when nothing works a canned reply is picked at random.
//!
//! Per request:
//! 1. Build the prompt, wrapping the text when an image was attached
//! 2. Probe the credential; on failure go straight to the fallback
//! 3. Try each endpoint in order, returning the first good reply. A rate
//!    limit stops the walk, any other error moves on to the next endpoint
//! 4. Pick a fallback reply

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::sync::Arc;

use crate::config::prompts;
use crate::config::prompts_builtin::FALLBACK_REPLIES;
use crate::providers::{GenerativeClient, ProviderError};

/// Anything that can produce an AI reply for a user message
#[async_trait]
pub trait ReplySource: Send + Sync {
    async fn respond(&self, text: &str, has_image: bool) -> Result<String, ProviderError>;

    /// Drop any per-room session state
    fn reset(&self, _room_id: &str) {}

    /// Drop every session
    fn reset_all(&self) {}
}

pub struct AiGateway {
    client: Arc<dyn GenerativeClient>,
    endpoints: Vec<String>,
    fallbacks: Vec<String>,
}

impl AiGateway {
    pub fn new(client: Arc<dyn GenerativeClient>, endpoints: Vec<String>) -> Self {
        Self {
            client,
            endpoints,
            fallbacks: prompts::default_fallback_replies(),
        }
    }

    /// Replace the canned replies. An empty list keeps the built-in set.
    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        if !fallbacks.is_empty() {
            self.fallbacks = fallbacks;
        }
        self
    }

    /// Produce a reply. Never fails.
    pub async fn reply(&self, text: &str, has_image: bool) -> String {
        let prompt = build_prompt(text, has_image);

        match self.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Provider gave no reply, using fallback");
                self.pick_fallback()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        if let Err(e) = self.client.probe().await {
            tracing::warn!(error = %e, "Credential probe failed, skipping generation");
            return Err(ProviderError::AuthInvalid);
        }

        let mut last_error = None;

        for endpoint in &self.endpoints {
            tracing::debug!(endpoint = %endpoint, "Trying endpoint");

            match self.client.generate(endpoint, prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_rate_limit() => {
                    tracing::warn!(endpoint = %endpoint, "Rate limited, not trying further endpoints");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::Unavailable("no endpoints configured".to_string())))
    }

    fn pick_fallback(&self) -> String {
        self.fallbacks
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_REPLIES[0].to_string())
    }
}

#[async_trait]
impl ReplySource for AiGateway {
    async fn respond(&self, text: &str, has_image: bool) -> Result<String, ProviderError> {
        Ok(self.reply(text, has_image).await)
    }
}

/// Raw text, or the image acknowledgment template around it
pub fn build_prompt(text: &str, has_image: bool) -> String {
    if has_image {
        prompts::image_prompt(text)
    } else {
        text.to_string()
    }
}

/// Reply recorded when reply generation itself broke down
pub fn local_fallback(has_image: bool) -> &'static str {
    use crate::config::prompts_builtin::{IMAGE_TURN_FALLBACK, TEXT_TURN_FALLBACK};

    if has_image {
        IMAGE_TURN_FALLBACK
    } else {
        TEXT_TURN_FALLBACK
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the fake client does for one generate call
    pub enum Scripted {
        Reply(&'static str),
        RateLimited,
        ServerError,
        Malformed,
    }

    /// Client with scripted outcomes and call counters
    pub struct FakeClient {
        probe_ok: bool,
        script: Mutex<VecDeque<Scripted>>,
        pub probes: AtomicUsize,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        pub fn new(probe_ok: bool, script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                probe_ok,
                script: Mutex::new(script.into()),
                probes: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeClient for FakeClient {
        async fn probe(&self) -> Result<(), ProviderError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.probe_ok {
                Ok(())
            } else {
                Err(ProviderError::AuthInvalid)
            }
        }

        async fn generate(&self, endpoint: &str, prompt: &str) -> Result<String, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}|{}", endpoint, prompt));

            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Reply(text)) => Ok(text.to_string()),
                Some(Scripted::RateLimited) => Err(ProviderError::RateLimited),
                Some(Scripted::ServerError) => Err(ProviderError::Http {
                    status: 500,
                    body: "internal".to_string(),
                }),
                Some(Scripted::Malformed) | None => {
                    Err(ProviderError::InvalidResponse("no candidates".to_string()))
                }
            }
        }
    }

    pub fn endpoints() -> Vec<String> {
        vec!["ep-a".to_string(), "ep-b".to_string(), "ep-c".to_string()]
    }

    fn is_fallback(reply: &str) -> bool {
        FALLBACK_REPLIES.contains(&reply)
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let client = FakeClient::new(true, vec![Scripted::Reply("Hello back")]);
        let gateway = AiGateway::new(client.clone(), endpoints());

        assert_eq!(gateway.reply("Hello", false).await, "Hello back");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_falls_through_to_later_endpoint() {
        let client = FakeClient::new(
            true,
            vec![Scripted::ServerError, Scripted::Malformed, Scripted::Reply("third time")],
        );
        let gateway = AiGateway::new(client.clone(), endpoints());

        assert_eq!(gateway.reply("Hi", false).await, "third time");

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("ep-a|"));
        assert!(calls[2].starts_with("ep-c|"));
    }

    #[tokio::test]
    async fn test_all_endpoints_fail_uses_fallback() {
        let client = FakeClient::new(
            true,
            vec![Scripted::ServerError, Scripted::Malformed, Scripted::ServerError],
        );
        let gateway = AiGateway::new(client.clone(), endpoints());

        let reply = gateway.reply("Hi", false).await;
        assert!(is_fallback(&reply));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_halts_walk() {
        let client = FakeClient::new(
            true,
            vec![Scripted::ServerError, Scripted::RateLimited, Scripted::Reply("unreached")],
        );
        let gateway = AiGateway::new(client.clone(), endpoints());

        let reply = gateway.reply("Hi", false).await;
        assert!(is_fallback(&reply));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_probe_skips_generation() {
        let client = FakeClient::new(false, vec![Scripted::Reply("unreached")]);
        let gateway = AiGateway::new(client.clone(), endpoints());

        let reply = gateway.reply("Hi", false).await;
        assert!(is_fallback(&reply));
        assert_eq!(client.probes.load(Ordering::SeqCst), 1);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_endpoints_uses_fallback() {
        let client = FakeClient::new(true, vec![]);
        let gateway = AiGateway::new(client.clone(), Vec::new());

        assert!(is_fallback(&gateway.reply("Hi", false).await));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_prompt_sent() {
        let client = FakeClient::new(true, vec![Scripted::Reply("Nice picture")]);
        let gateway = AiGateway::new(client.clone(), endpoints());

        gateway.reply("my dog", true).await;

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0], format!("ep-a|{}", prompts::image_prompt("my dog")));
    }

    #[tokio::test]
    async fn test_custom_fallbacks() {
        let client = FakeClient::new(false, vec![]);
        let gateway = AiGateway::new(client, endpoints())
            .with_fallbacks(vec!["Only option".to_string()]);

        assert_eq!(gateway.reply("Hi", false).await, "Only option");
    }

    #[tokio::test]
    async fn test_respond_never_errors() {
        let client = FakeClient::new(true, vec![Scripted::RateLimited]);
        let gateway = AiGateway::new(client, endpoints());

        assert!(gateway.respond("Hi", false).await.is_ok());
    }

    #[test]
    fn test_local_fallback_by_image_flag() {
        assert_ne!(local_fallback(true), local_fallback(false));
        assert!(local_fallback(true).contains("image"));
    }
}
