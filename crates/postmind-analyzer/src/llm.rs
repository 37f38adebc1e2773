//! Chat backend seam and the Mistral implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use postmind_core::{defaults, Error, Result};

/// Default chat-completions endpoint.
pub const DEFAULT_MISTRAL_URL: &str = "https://api.mistral.ai/v1";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "open-mistral-7b";

/// Single-prompt chat completion returning the raw model text.
///
/// The production implementation is [`MistralBackend`]; tests use
/// [`mock::MockChatBackend`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Configuration for the Mistral backend.
#[derive(Debug, Clone)]
pub struct MistralConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl MistralConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Required | Default |
    /// |----------|----------|---------|
    /// | `MISTRAL_API_KEY` | **yes** | -- |
    /// | `MODEL` | no | `open-mistral-7b` |
    /// | `TIMEOUT` | no | `30` (seconds) |
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MISTRAL_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("MISTRAL_API_KEY must be set".into()))?;

        let model = std::env::var("MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout = std::env::var("TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::LLM_TIMEOUT_SECS);

        Ok(Self {
            base_url: DEFAULT_MISTRAL_URL.to_string(),
            api_key,
            model,
            timeout: Duration::from_secs(timeout),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Mistral chat-completions backend in JSON mode.
pub struct MistralBackend {
    client: Client,
    config: MistralConfig,
}

impl MistralBackend {
    pub fn new(config: MistralConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Inference(format!("failed to create HTTP client: {e}")))?;

        info!(
            subsystem = "analyzer",
            component = "mistral",
            model = %config.model,
            "Initializing Mistral backend"
        );

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ChatBackend for MistralBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // The classifier keys off these message markers.
                if e.is_timeout() {
                    Error::Inference(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    Error::Inference(format!("connection failed: {e}"))
                } else {
                    Error::Inference(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::Inference("rate limit exceeded (429)".into()));
        }
        if status.is_server_error() {
            return Err(Error::Inference(format!("temporary upstream error: {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("api error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("invalid response body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Inference("empty response from model".into()))?;

        debug!(
            subsystem = "analyzer",
            component = "mistral",
            response_len = content.len(),
            "Model responded"
        );
        Ok(content)
    }
}

/// Deterministic chat backend for tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scriptable backend: fixed response or scripted failure, with a
    /// call counter.
    pub struct MockChatBackend {
        response: Mutex<Result<String>>,
        calls: AtomicUsize,
    }

    impl MockChatBackend {
        pub fn responding(content: &str) -> Self {
            Self {
                response: Mutex::new(Ok(content.to_string())),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                response: Mutex::new(Err(Error::Inference(message.to_string()))),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn set_response(&self, content: &str) {
            *self.response.lock().unwrap() = Ok(content.to_string());
        }
    }

    #[async_trait]
    impl ChatBackend for MockChatBackend {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &*self.response.lock().unwrap() {
                Ok(content) => Ok(content.clone()),
                Err(e) => Err(Error::Inference(e.to_string())),
            }
        }
    }
}
