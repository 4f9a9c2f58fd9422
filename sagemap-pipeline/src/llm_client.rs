// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Chat-completion client used by every pipeline stage
//!
//! One implementation covers both the direct OpenAI endpoint and an Azure
//! OpenAI deployment acting as a gateway. Failures are classified so callers
//! can tell an unusable key from a flaky network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default request timeout for a single completion
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Trait for chat-completion clients
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a chat request and return the generated text
    async fn complete(&self, request: ChatRequest) -> Result<LLMResponse, LLMError>;

    /// Cheap authenticated call used to check that the key is usable.
    ///
    /// Defaults to a one-token completion; clients with a cheaper endpoint
    /// override it.
    async fn verify_key(&self) -> Result<(), LLMError> {
        self.complete(ChatRequest::prompt("ping", 0.0, 1)).await?;
        Ok(())
    }

    /// Get model name
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ChatRequest {
    /// Request consisting of one user prompt
    pub fn prompt(prompt: impl Into<String>, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            temperature,
            max_output_tokens,
        }
    }

    /// Content of the last user message
    pub fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Coarse failure classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Auth,
    RateLimit,
    Transport,
    Unknown,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
}

impl LLMError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LLMError::Unauthorized(_) => ErrorClass::Auth,
            LLMError::RateLimitExceeded => ErrorClass::RateLimit,
            LLMError::Timeout | LLMError::Http(_) => ErrorClass::Transport,
            LLMError::ApiError { .. } | LLMError::InvalidResponse(_) => ErrorClass::Unknown,
        }
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LLMError::Unauthorized(body),
            429 => LLMError::RateLimitExceeded,
            code => LLMError::ApiError {
                status: code,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LLMError::Timeout
        } else {
            LLMError::Http(e)
        }
    }
}

/// Where completions are sent
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// OpenAI-compatible API rooted at `base_url` (e.g. `https://api.openai.com/v1`)
    OpenAI { base_url: String },
    /// Azure OpenAI deployment
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// OpenAI / Azure OpenAI client implementation
pub struct OpenAIClient {
    api_key: String,
    model: String,
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            endpoint: Endpoint::OpenAI {
                base_url: "https://api.openai.com/v1".to_string(),
            },
            client: build_http_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Client for an Azure OpenAI deployment. The deployment name doubles as
    /// the model name.
    pub fn azure(api_key: String, endpoint: String, deployment: String, api_version: String) -> Self {
        Self {
            api_key,
            model: deployment.clone(),
            endpoint: Endpoint::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                deployment,
                api_version,
            },
            client: build_http_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.endpoint = Endpoint::OpenAI {
            base_url: base_url.trim_end_matches('/').to_string(),
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn completions_request(&self) -> reqwest::RequestBuilder {
        match &self.endpoint {
            Endpoint::OpenAI { base_url } => self
                .client
                .post(format!("{}/chat/completions", base_url))
                .header("Authorization", format!("Bearer {}", self.api_key)),
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => self
                .client
                .post(format!(
                    "{}/openai/deployments/{}/chat/completions",
                    endpoint, deployment
                ))
                .query(&[("api-version", api_version.as_str())])
                .header("api-key", &self.api_key),
        }
    }

    fn models_request(&self) -> reqwest::RequestBuilder {
        match &self.endpoint {
            Endpoint::OpenAI { base_url } => self
                .client
                .get(format!("{}/models", base_url))
                .header("Authorization", format!("Bearer {}", self.api_key)),
            Endpoint::Azure {
                endpoint,
                api_version,
                ..
            } => self
                .client
                .get(format!("{}/openai/models", endpoint))
                .query(&[("api-version", api_version.as_str())])
                .header("api-key", &self.api_key),
        }
    }
}

fn build_http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(
                error = %e,
                timeout_ms = timeout.as_millis() as u64,
                "Failed to build HTTP client, falling back to defaults without a request timeout"
            );
            reqwest::Client::new()
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, request: ChatRequest) -> Result<LLMResponse, LLMError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
        });

        let response = self
            .completions_request()
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text));
        }

        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        let usage_data = &response_data["usage"];
        let usage = TokenUsage {
            prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
        };

        tracing::debug!(
            model = %self.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Chat completion finished"
        );

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    async fn verify_key(&self) -> Result<(), LLMError> {
        let response = self.models_request().send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text));
        }

        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
