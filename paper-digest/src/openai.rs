//! # OpenAI-compatible text generation
//!
//! [`OpenAiClient`] implements the core [`TextGenerator`] contract against a
//! `POST <base_url>/chat/completions` endpoint. One request carries exactly a
//! system message and a user message. Failures are returned, never retried;
//! the summarizer decides what a failed call means for the paper.

use async_trait::async_trait;
use paper_digest_core::contract::{GenerationError, GenerationRequest, TextGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::load_config::OpenAiSettings;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings) -> Self {
        let endpoint = format!(
            "{}/chat/completions",
            settings.base_url.trim_end_matches('/')
        );
        tracing::info!(
            endpoint = %endpoint,
            model = %settings.model,
            api_key_set = settings.api_key.is_some(),
            "Initialized OpenAiClient"
        );
        Self {
            client: Client::new(),
            endpoint,
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("No API key configured, refusing to call text generation");
            return Err(GenerationError::MissingCredential);
        };

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        tracing::debug!(
            endpoint = %self.endpoint,
            system_chars = request.system.len(),
            user_chars = request.user.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, endpoint = %self.endpoint, "Chat completion request failed");
                GenerationError::Transport(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %text, "Chat completion returned error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(error = ?e, "Failed to parse chat completion response");
            GenerationError::InvalidResponse(e.to_string())
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}
