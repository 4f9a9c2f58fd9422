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

//! Reflection questions over a belief set

use crate::config::{GenerationParams, SagemapConfig};
use crate::decoder::{decode, preview};
use crate::error::PipelineError;
use crate::llm_client::{ChatRequest, LLMClient};
use crate::prompts::{reflection_prompt, REFLECTION_TEMPLATE};
use sagemap_core::Belief;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Most questions returned for one request
pub const MAX_QUESTIONS: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionRequest {
    pub beliefs: Vec<Belief>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

pub struct ReflectionGenerator {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
    params: GenerationParams,
}

impl ReflectionGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            prompt_template: REFLECTION_TEMPLATE.to_string(),
            params: GenerationParams::reflection(),
        }
    }

    pub fn with_prompt_template(mut self, template: String) -> Self {
        self.prompt_template = template;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Generate up to [`MAX_QUESTIONS`] questions. Any failure yields none.
    pub async fn generate(&self, beliefs: &[Belief]) -> Vec<String> {
        if beliefs.is_empty() {
            return Vec::new();
        }

        let prompt = reflection_prompt(&self.prompt_template, beliefs);
        let request = ChatRequest::prompt(prompt, self.params.temperature, self.params.max_output_tokens);

        let response = match self.llm_client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Reflection question generation failed");
                return Vec::new();
            }
        };

        match decode(&response.content) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .take(MAX_QUESTIONS)
                .map(String::from)
                .collect(),
            _ => {
                warn!(raw = %preview(&response.content), "Failed to decode reflection questions");
                Vec::new()
            }
        }
    }
}

/// Resolve the key and generate questions for `request`.
///
/// An empty belief set needs no key and makes no call.
pub async fn generate_reflection_questions(
    config: &SagemapConfig,
    request: &ReflectionRequest,
) -> Result<Vec<String>, PipelineError> {
    if request.beliefs.is_empty() {
        return Ok(Vec::new());
    }

    let client = config.model.build_client(request.api_key.as_deref())?;
    Ok(ReflectionGenerator::new(client)
        .with_params(config.reflection)
        .generate(&request.beliefs)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LLMError;
    use crate::test_support::{belief, MockLLMClient};

    fn beliefs() -> Vec<Belief> {
        vec![belief("b1", "Money buys happiness", &["money"])]
    }

    #[tokio::test]
    async fn test_generates_questions() {
        let client = Arc::new(MockLLMClient::replying(
            r#"["Where did your view on money come from?", 7, "  ", "What would change your mind?"]"#,
        ));
        let generator = ReflectionGenerator::new(client.clone());

        let questions = generator.generate(&beliefs()).await;
        assert_eq!(
            questions,
            vec![
                "Where did your view on money come from?",
                "What would change your mind?"
            ]
        );
        assert!(client.prompts()[0].contains("- \"Money buys happiness\" (money)"));
    }

    #[tokio::test]
    async fn test_caps_question_count() {
        let client = Arc::new(MockLLMClient::replying(r#"["1?", "2?", "3?", "4?", "5?", "6?", "7?"]"#));
        let questions = ReflectionGenerator::new(client).generate(&beliefs()).await;
        assert_eq!(questions.len(), MAX_QUESTIONS);
    }

    #[tokio::test]
    async fn test_empty_beliefs_make_no_call() {
        let client = Arc::new(MockLLMClient::replying(r#"["?"]"#));
        let questions = ReflectionGenerator::new(client.clone()).generate(&[]).await;
        assert!(questions.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_yield_no_questions() {
        let failing = ReflectionGenerator::new(Arc::new(MockLLMClient::failing(|| LLMError::Timeout)));
        assert!(failing.generate(&beliefs()).await.is_empty());

        let garbage = ReflectionGenerator::new(Arc::new(MockLLMClient::replying(r#"{"questions": 3}"#)));
        assert!(garbage.generate(&beliefs()).await.is_empty());
    }

    #[tokio::test]
    async fn test_request_without_key() {
        let config = SagemapConfig::default();

        let empty = ReflectionRequest::default();
        assert!(generate_reflection_questions(&config, &empty).await.unwrap().is_empty());

        let request = ReflectionRequest {
            beliefs: beliefs(),
            api_key: None,
        };
        assert!(matches!(
            generate_reflection_questions(&config, &request).await,
            Err(PipelineError::MissingApiKey)
        ));
    }
}
