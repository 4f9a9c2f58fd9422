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

//! Belief extraction from journal text

use crate::config::GenerationParams;
use crate::decoder::{decode, preview};
use crate::llm_client::{ChatRequest, LLMClient, LLMError};
use crate::prompts::{extraction_prompt, EXTRACTION_TEMPLATE};
use sagemap_core::{BeliefType, CandidateBelief};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns raw journal text into candidate beliefs
pub struct BeliefExtractor {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
    params: GenerationParams,
    max_beliefs: usize,
}

impl BeliefExtractor {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            prompt_template: EXTRACTION_TEMPLATE.to_string(),
            params: GenerationParams::extraction(),
            max_beliefs: 10,
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

    pub fn with_max_beliefs(mut self, max_beliefs: usize) -> Self {
        self.max_beliefs = max_beliefs;
        self
    }

    /// Extract candidate beliefs from `text`.
    ///
    /// Model errors propagate: without a successful extraction call there is
    /// nothing to process. Unparsable or wrongly shaped output only yields an
    /// empty list.
    pub async fn extract(&self, text: &str) -> Result<Vec<CandidateBelief>, LLMError> {
        let prompt = extraction_prompt(&self.prompt_template, text);
        let request = ChatRequest::prompt(prompt, self.params.temperature, self.params.max_output_tokens);
        let response = self.llm_client.complete(request).await?;

        let items = match decode(&response.content) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!(kind = json_kind(&other), "Extraction returned a non-array value");
                return Ok(Vec::new());
            }
            None => {
                warn!(raw = %preview(&response.content), "Failed to decode extraction response");
                return Ok(Vec::new());
            }
        };

        let proposed = items.len();
        let mut candidates: Vec<CandidateBelief> = items.iter().filter_map(parse_candidate).collect();
        if candidates.len() < proposed {
            debug!(
                proposed,
                kept = candidates.len(),
                "Dropped malformed belief entries"
            );
        }

        if candidates.len() > self.max_beliefs {
            warn!(
                returned = candidates.len(),
                max = self.max_beliefs,
                "Model returned more beliefs than allowed, truncating"
            );
            candidates.truncate(self.max_beliefs);
        }

        debug!(count = candidates.len(), "Extracted candidate beliefs");
        Ok(candidates)
    }
}

/// Validate one array element. Entries without text or topics are dropped.
fn parse_candidate(item: &Value) -> Option<CandidateBelief> {
    let text = item.get("text")?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    let topics: Vec<&str> = match item.get("topics") {
        Some(Value::Array(topics)) => topics.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(topic)) => vec![topic.as_str()],
        _ => Vec::new(),
    };

    let confidence = item.get("confidence").and_then(parse_confidence).unwrap_or(5);

    let belief_type = item
        .get("belief_type")
        .or_else(|| item.get("type"))
        .and_then(Value::as_str)
        .and_then(BeliefType::parse)
        .unwrap_or(BeliefType::Derived);

    let candidate = CandidateBelief::new(text, confidence, topics, belief_type);
    if candidate.topics.is_empty() {
        return None;
    }
    Some(candidate)
}

fn parse_confidence(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockLLMClient;

    fn with_client(client: MockLLMClient) -> (BeliefExtractor, Arc<MockLLMClient>) {
        let client = Arc::new(client);
        (BeliefExtractor::new(client.clone()), client)
    }

    #[tokio::test]
    async fn test_extracts_beliefs() {
        let (extractor, client) = with_client(MockLLMClient::replying(
            r#"[
                {"text": "Money buys happiness", "confidence": 7, "topics": ["Money", "happiness"], "belief_type": "assumption"},
                {"text": "Creative work matters more than salary", "confidence": 8, "topics": ["work"], "belief_type": "core"}
            ]"#,
        ));

        let beliefs = extractor.extract("I think money buys happiness.").await.unwrap();

        assert_eq!(beliefs.len(), 2);
        assert_eq!(beliefs[0].topics, vec!["money", "happiness"]);
        assert_eq!(beliefs[0].belief_type, BeliefType::Assumption);
        assert_eq!(beliefs[1].confidence, 8);
        assert_ne!(beliefs[0].temp_id, beliefs[1].temp_id);
        assert_eq!(client.calls(), 1);
        assert!(client.prompts()[0].contains("I think money buys happiness."));
    }

    #[tokio::test]
    async fn test_salvages_fenced_output() {
        let (extractor, _) = with_client(MockLLMClient::replying(
            "Here are the beliefs:\n```json\n[{\"text\": \"Rest is productive\", \"confidence\": 6, \"topics\": [\"rest\"], \"belief_type\": \"derived\"}]\n```",
        ));

        let beliefs = extractor.extract("entry").await.unwrap();
        assert_eq!(beliefs.len(), 1);
        assert_eq!(beliefs[0].text, "Rest is productive");
    }

    #[tokio::test]
    async fn test_unparsable_output_is_empty() {
        let (extractor, _) = with_client(MockLLMClient::replying("I could not find any beliefs."));
        assert!(extractor.extract("entry").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_array_output_is_empty() {
        let (extractor, _) = with_client(MockLLMClient::replying(
            r#"{"text": "Money buys happiness", "confidence": 7, "topics": ["money"]}"#,
        ));
        assert!(extractor.extract("entry").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let (extractor, _) = with_client(MockLLMClient::failing(|| {
            LLMError::Unauthorized("invalid key".to_string())
        }));

        let err = extractor.extract("entry").await.unwrap_err();
        assert!(matches!(err, LLMError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_shape_validation() {
        let (extractor, _) = with_client(MockLLMClient::replying(
            r#"[
                {"text": "", "confidence": 5, "topics": ["a"]},
                {"text": "No topics here", "confidence": 5, "topics": []},
                {"confidence": 5, "topics": ["a"]},
                "just a string",
                {"text": "Loud", "confidence": 40, "topics": "volume", "belief_type": "hunch"},
                {"text": "Quiet", "confidence": "2.6", "topics": ["volume", 3]}
            ]"#,
        ));

        let beliefs = extractor.extract("entry").await.unwrap();
        assert_eq!(beliefs.len(), 2);

        assert_eq!(beliefs[0].text, "Loud");
        assert_eq!(beliefs[0].confidence, 10);
        assert_eq!(beliefs[0].topics, vec!["volume"]);
        assert_eq!(beliefs[0].belief_type, BeliefType::Derived);

        assert_eq!(beliefs[1].confidence, 3);
        assert_eq!(beliefs[1].topics, vec!["volume"]);
    }

    #[tokio::test]
    async fn test_truncates_to_max_beliefs() {
        let items: Vec<Value> = (0..14)
            .map(|i| {
                serde_json::json!({
                    "text": format!("belief {}", i),
                    "confidence": 5,
                    "topics": ["life"],
                    "belief_type": "derived"
                })
            })
            .collect();
        let (extractor, _) = with_client(MockLLMClient::replying(&Value::Array(items).to_string()));

        let beliefs = extractor.extract("entry").await.unwrap();
        assert_eq!(beliefs.len(), 10);
        assert_eq!(beliefs[9].text, "belief 9");

        let (small, _) = with_client(MockLLMClient::replying(r#"[{"text":"a","topics":["x"]},{"text":"b","topics":["x"]}]"#));
        let small = small.with_max_beliefs(1);
        assert_eq!(small.extract("entry").await.unwrap().len(), 1);
    }
}
