use crate::{errors::PromptError, providers::ai::AiProvider};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_COMPLETIONS_URL: &str = "https://api.fireworks.ai/inference/v1/completions";
pub const DEFAULT_COMPLETIONS_MODEL: &str = "accounts/fireworks/models/llama-v3p3-70b-instruct";

// --- OpenAI-style completions request and response structures ---

#[derive(Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Deserialize, Debug)]
struct CompletionsResponse {
    #[serde(default)]
    choices: Vec<CompletionsChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionsChoice {
    #[serde(default)]
    text: String,
}

/// Sampling and transport settings for a [`CompletionsProvider`].
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionsConfig {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    /// Wall-clock limit for one request, including reading the body.
    pub request_timeout: Duration,
}

impl Default for CompletionsConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_COMPLETIONS_URL.to_string(),
            model: DEFAULT_COMPLETIONS_MODEL.to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            top_p: 1.0,
            top_k: 40,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// --- Completions Provider implementation ---

/// A provider for text-completion endpoints (Fireworks by default).
#[derive(Clone, Debug)]
pub struct CompletionsProvider {
    client: ReqwestClient,
    api_key: String,
    config: CompletionsConfig,
}

impl CompletionsProvider {
    pub fn new(api_key: String, config: CompletionsConfig) -> Result<Self, PromptError> {
        if api_key.trim().is_empty() {
            return Err(PromptError::MissingApiKey);
        }
        let client = ReqwestClient::builder()
            .build()
            .map_err(PromptError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }
}

#[async_trait]
impl AiProvider for CompletionsProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PromptError> {
        let request_body = CompletionsRequest {
            model: &self.config.model,
            prompt: format!("{system_prompt}\n\nText to analyze:\n{user_prompt}"),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        };

        info!("Processing text of length {}", user_prompt.chars().count());
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout)
            .json(&request_body)
            .send()
            .await
            .map_err(PromptError::AiRequest)?;

        let status = response.status();
        info!("Received response (status: {status})");
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PromptError::AiApi(format!("{status}: {error_text}")));
        }

        let completions: CompletionsResponse = response
            .json()
            .await
            .map_err(PromptError::AiDeserialization)?;

        let text = completions
            .choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or(PromptError::EmptyCompletion)?;
        debug!("Raw completion text ({} chars):\n{text}", text.len());
        Ok(text)
    }
}
