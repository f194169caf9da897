use crate::config::Config;
use crate::retry::{with_retry_if, RetryConfig};
use crate::translator::Translator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a professional translation assistant.";

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct TranslationRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Non-success HTTP status from the chat completion endpoint
#[derive(Debug, thiserror::Error)]
#[error("OpenAI API error ({status}): {body}")]
struct ApiStatusError {
    status: StatusCode,
    body: String,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

fn build_user_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following English sentence into {}. \
         Return only the translated sentence.\n\n{}",
        target_language, text
    )
}

fn build_request(model: &str, text: &str, target_language: &str) -> TranslationRequest {
    let is_reasoning = is_reasoning_model(model);

    TranslationRequest {
        model: model.to_string(),
        messages: vec![
            Message {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: build_user_prompt(text, target_language),
            },
        ],
        // Deterministic output keeps cached translations stable
        temperature: if is_reasoning { None } else { Some(0.0) },
        reasoning_effort: if is_reasoning {
            Some("low".to_string())
        } else {
            None
        },
    }
}

/// Retry 429 and 5xx responses plus network and parse failures; other 4xx fail at once
fn is_retryable_error(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<ApiStatusError>() {
        Some(api_error) => {
            api_error.status == StatusCode::TOO_MANY_REQUESTS || api_error.status.is_server_error()
        }
        None => true,
    }
}

/// [`Translator`] backed by the OpenAI chat completion API
#[derive(Debug, Clone)]
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
    retry: RetryConfig,
}

impl OpenAiTranslator {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            api_url: api_url.into(),
            retry: RetryConfig::api_call(),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        Self::new(
            client,
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_api_url.clone(),
        )
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn request_translation(&self, request: &TranslationRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send translation request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ApiStatusError { status, body }.into());
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI translation response")?;

        let translated = chat_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .context("OpenAI translation response contained no choices")?;

        Ok(translated)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let request = build_request(&self.model, text, target_language);
        debug!("Requesting translation into {} from {}", target_language, self.model);

        with_retry_if(
            &self.retry,
            &format!("Translation to {}", target_language),
            || self.request_translation(&request),
            is_retryable_error,
        )
        .await
    }
}
