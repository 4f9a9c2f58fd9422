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

use crate::llm_client::{LLMClient, OpenAIClient, DEFAULT_TIMEOUT_SECS};
use crate::PipelineError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Sagemap pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SagemapConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default = "GenerationParams::extraction")]
    pub extraction: GenerationParams,

    #[serde(default = "GenerationParams::relations")]
    pub relations: GenerationParams,

    #[serde(default = "GenerationParams::reflection")]
    pub reflection: GenerationParams,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAI,
    Azure,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Chat model name (ignored in Azure mode, where the deployment decides)
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Service-level API key, used when the caller supplies none
    pub api_key: Option<String>,

    /// Azure resource endpoint (e.g., "https://my-resource.openai.azure.com")
    pub azure_endpoint: Option<String>,

    pub azure_deployment: Option<String>,

    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,

    /// Per-call timeout in seconds. Expiry counts as a transport failure.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Sampling settings for one kind of model call
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn extraction() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 4000,
        }
    }

    pub fn relations() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 2000,
        }
    }

    pub fn reflection() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    /// Hard cap on beliefs kept from one extraction
    #[serde(default = "default_max_beliefs")]
    pub max_beliefs: usize,

    /// Candidates whose relation checks may be in flight at once
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Also compare each candidate against the other candidates of the same entry
    #[serde(default)]
    pub compare_within_entry: bool,
}

// Default values
fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_azure_api_version() -> String {
    "2024-12-01-preview".to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_beliefs() -> usize {
    10
}

fn default_max_concurrent_checks() -> usize {
    4
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAI,
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            azure_endpoint: None,
            azure_deployment: None,
            azure_api_version: default_azure_api_version(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SagemapConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            extraction: GenerationParams::extraction(),
            relations: GenerationParams::relations(),
            reflection: GenerationParams::reflection(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_beliefs: default_max_beliefs(),
            max_concurrent_checks: default_max_concurrent_checks(),
            compare_within_entry: false,
        }
    }
}

/// Pick the API key for a request: a non-blank caller-supplied key wins,
/// then a non-blank configured key.
pub fn resolve_api_key(supplied: Option<&str>, configured: Option<&str>) -> Option<String> {
    [supplied, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(String::from)
}

impl ModelConfig {
    /// Build the model client for one request.
    ///
    /// Fails with [`PipelineError::MissingApiKey`] before any network
    /// activity when no usable key exists.
    pub fn build_client(&self, supplied_key: Option<&str>) -> Result<Arc<dyn LLMClient>, PipelineError> {
        let api_key = resolve_api_key(supplied_key, self.api_key.as_deref())
            .ok_or(PipelineError::MissingApiKey)?;
        let timeout = Duration::from_secs(self.request_timeout_secs);

        let client = match self.provider {
            Provider::OpenAI => OpenAIClient::new(api_key, self.model.clone())
                .with_base_url(self.base_url.clone()),
            Provider::Azure => {
                let endpoint = self.azure_endpoint.clone().ok_or_else(|| {
                    PipelineError::Config("azure provider requires azure_endpoint".to_string())
                })?;
                let deployment = self.azure_deployment.clone().ok_or_else(|| {
                    PipelineError::Config("azure provider requires azure_deployment".to_string())
                })?;
                OpenAIClient::azure(api_key, endpoint, deployment, self.azure_api_version.clone())
            }
        };

        Ok(Arc::new(client.with_timeout(timeout)))
    }

    /// Make a cheap authenticated call to check the resolved key
    pub async fn verify_api_key(&self, supplied_key: Option<&str>) -> Result<(), PipelineError> {
        let client = self.build_client(supplied_key)?;
        client.verify_key().await?;
        Ok(())
    }
}

impl SagemapConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - OPENAI_API_KEY: service-level API key
    /// - SAGEMAP_MODEL: chat model name (default: gpt-4o)
    /// - OPENAI_BASE_URL: OpenAI-compatible API root
    /// - AZURE_OPENAI_ENDPOINT: switches the provider to Azure
    /// - AZURE_OPENAI_API_KEY: key for the Azure deployment
    /// - AZURE_OPENAI_DEPLOYMENT_NAME: Azure deployment to call
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Load configuration with priority: file > env > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::from_env();

        if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                let file_config = Self::from_file(&path)?;
                config = file_config.fill_from(config);
            } else {
                tracing::warn!("Config file not found: {:?}, using env and defaults", path);
            }
        }

        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }

        if let Some(model) = lookup("SAGEMAP_MODEL") {
            self.model.model = model;
        }

        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.model.base_url = base_url;
        }

        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.model.provider = Provider::Azure;
            self.model.azure_endpoint = Some(endpoint);

            if let Some(key) = lookup("AZURE_OPENAI_API_KEY") {
                self.model.api_key = Some(key);
            }
        }

        if let Some(deployment) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.model.azure_deployment = Some(deployment);
        }
    }

    /// Keep values set in the file and take the rest from `env` (env beats
    /// defaults, the file beats env)
    fn fill_from(mut self, env: Self) -> Self {
        if self.model.api_key.is_none() {
            self.model.api_key = env.model.api_key;
        }
        if self.model.azure_endpoint.is_none() {
            if env.model.azure_endpoint.is_some() && self.model.provider == Provider::OpenAI {
                self.model.provider = env.model.provider;
            }
            self.model.azure_endpoint = env.model.azure_endpoint;
        }
        if self.model.azure_deployment.is_none() {
            self.model.azure_deployment = env.model.azure_deployment;
        }
        if self.model.model == default_model() {
            self.model.model = env.model.model;
        }
        if self.model.base_url == default_base_url() {
            self.model.base_url = env.model.base_url;
        }
        self
    }
}
