// OpenAI chat-completions client used to draft review replies.
//
// The orchestrator only sees the `Responder` trait: review text in, reply text
// or a typed failure out. `ResponderClient` picks the real client when an API
// key is configured and a disabled stand-in otherwise.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use autoresponder_core::config::{Config, ResponderConfig};

use crate::prompt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("responder not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response payload: {0}")]
    Malformed(String),

    #[error("responder returned an empty reply")]
    Empty,
}

// ---------------------------------------------------------------------------
// Responder capability
// ---------------------------------------------------------------------------

/// Turns assembled review text into a reply.
///
/// Implementations are stateless from the caller's point of view. An `Ok`
/// value is never blank.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate(&self, review_text: &str) -> Result<String, ResponderError>;
}

// ---------------------------------------------------------------------------
// OpenAiResponder
// ---------------------------------------------------------------------------

/// Chat-completions client with a fixed model, token budget and prompt.
pub struct OpenAiResponder {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl OpenAiResponder {
    pub fn new(http: reqwest::Client, api_key: String, config: &ResponderConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: prompt::system_prompt(config.system_prompt.as_deref()).to_string(),
        }
    }

    fn request_body(&self, review_text: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": review_text }
            ]
        })
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn generate(&self, review_text: &str) -> Result<String, ResponderError> {
        if self.api_key.is_empty() {
            return Err(ResponderError::NotConfigured);
        }

        debug!(model = %self.model, "requesting reply from OpenAI");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(review_text))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "OpenAI request failed");
            return Err(ResponderError::Status {
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }

        let text = parse_completion_text(&body)
            .ok_or_else(|| ResponderError::Malformed(truncate(&body, 300)))?;
        if text.is_empty() {
            return Err(ResponderError::Empty);
        }

        info!("Reply received from OpenAI");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// ResponderClient wrapper
// ---------------------------------------------------------------------------

/// Either a live OpenAI client or disabled.
pub enum ResponderClient {
    /// OpenAI is configured and ready.
    Active(OpenAiResponder),
    /// No API key configured; every generation fails with `NotConfigured`.
    Disabled,
}

impl ResponderClient {
    /// Build a `ResponderClient` from the application config.
    ///
    /// Returns `Active` if an OpenAI key is present in credentials, otherwise
    /// `Disabled`.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        match &config.credentials.openai_api_key {
            Some(key) if !key.trim().is_empty() => ResponderClient::Active(OpenAiResponder::new(
                http,
                key.trim().to_string(),
                &config.responder,
            )),
            _ => ResponderClient::Disabled,
        }
    }
}

#[async_trait]
impl Responder for ResponderClient {
    async fn generate(&self, review_text: &str) -> Result<String, ResponderError> {
        match self {
            ResponderClient::Active(client) => client.generate(review_text).await,
            ResponderClient::Disabled => Err(ResponderError::NotConfigured),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON parsing helpers
// ---------------------------------------------------------------------------

/// Extract `choices[0].message.content` from a chat-completions response,
/// trimmed.
///
/// Expected shape: `{ "choices": [ { "message": { "role": "assistant", "content": "..." } } ] }`
pub(crate) fn parse_completion_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.trim().to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
