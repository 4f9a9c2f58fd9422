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

//! Relation checkers
//!
//! Both checkers use the model as a judge over the existing beliefs that
//! share a topic with the candidate. They never fail: a model error or an
//! unreadable verdict means "no relation".
//!
//! Ids in a verdict are only trusted when they name a belief that was shown
//! to the model.

use crate::config::GenerationParams;
use crate::decoder::{decode, preview};
use crate::llm_client::{ChatRequest, LLMClient, LLMError};
use crate::prompts::{relation_prompt, CONTRADICTION_TEMPLATE, EVOLUTION_TEMPLATE};
use sagemap_core::{Belief, BeliefId, CandidateBelief};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verdict of a contradiction check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContradictionResult {
    pub has_contradiction: bool,
    #[serde(alias = "contradictingBeliefs")]
    pub contradicting_ids: Vec<BeliefId>,
    pub explanation: String,
}

impl ContradictionResult {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Verdict of an evolution check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvolutionResult {
    pub has_evolution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evolved_from_id: Option<BeliefId>,
    pub explanation: String,
}

impl EvolutionResult {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Active beliefs sharing at least one topic with `candidate`.
///
/// The candidate itself is never part of its own pool.
pub fn relevant_beliefs<'a>(candidate: &CandidateBelief, existing: &'a [Belief]) -> Vec<&'a Belief> {
    existing
        .iter()
        .filter(|belief| belief.id != candidate.temp_id)
        .filter(|belief| belief.is_active() && belief.shares_topic_with(&candidate.topics))
        .collect()
}

/// Send a judgment prompt and decode the reply
async fn ask_judge(
    llm_client: &dyn LLMClient,
    prompt: String,
    params: GenerationParams,
) -> Result<Option<Value>, LLMError> {
    let request = ChatRequest::prompt(prompt, params.temperature, params.max_output_tokens);
    let response = llm_client.complete(request).await?;

    let decoded = decode(&response.content);
    if decoded.is_none() {
        warn!(raw = %preview(&response.content), "Failed to decode relation verdict");
    }
    Ok(decoded)
}

fn explanation_of(verdict: &Value) -> String {
    verdict
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flag_of(verdict: &Value, key: &str) -> bool {
    match verdict.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decides whether a candidate contradicts existing beliefs
pub struct ContradictionChecker {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
    params: GenerationParams,
}

impl ContradictionChecker {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            prompt_template: CONTRADICTION_TEMPLATE.to_string(),
            params: GenerationParams::relations(),
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

    pub async fn check(&self, candidate: &CandidateBelief, existing: &[Belief]) -> ContradictionResult {
        let pool = relevant_beliefs(candidate, existing);
        if pool.is_empty() {
            debug!(candidate = %candidate.temp_id, "No topical overlap, skipping contradiction check");
            return ContradictionResult::none();
        }

        let prompt = relation_prompt(&self.prompt_template, candidate, &pool);
        match ask_judge(self.llm_client.as_ref(), prompt, self.params).await {
            Ok(Some(verdict)) => Self::interpret(&verdict, &pool),
            Ok(None) => ContradictionResult::none(),
            Err(e) => {
                warn!(candidate = %candidate.temp_id, error = %e, "Contradiction check failed, assuming none");
                ContradictionResult::none()
            }
        }
    }

    fn interpret(verdict: &Value, pool: &[&Belief]) -> ContradictionResult {
        if !flag_of(verdict, "hasContradiction") {
            return ContradictionResult {
                explanation: explanation_of(verdict),
                ..ContradictionResult::none()
            };
        }

        let named = verdict
            .get("contradictingIds")
            .or_else(|| verdict.get("contradictingBeliefs"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut ids: Vec<BeliefId> = Vec::new();
        for id in named.iter().filter_map(id_of) {
            if !pool.iter().any(|belief| belief.id == id) {
                warn!(id = %id, "Discarding contradiction id outside the compared beliefs");
                continue;
            }
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        if ids.is_empty() {
            return ContradictionResult::none();
        }

        ContradictionResult {
            has_contradiction: true,
            contradicting_ids: ids,
            explanation: explanation_of(verdict),
        }
    }
}

/// Decides whether a candidate refines one existing belief
pub struct EvolutionChecker {
    llm_client: Arc<dyn LLMClient>,
    prompt_template: String,
    params: GenerationParams,
}

impl EvolutionChecker {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            prompt_template: EVOLUTION_TEMPLATE.to_string(),
            params: GenerationParams::relations(),
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

    pub async fn check(&self, candidate: &CandidateBelief, existing: &[Belief]) -> EvolutionResult {
        let pool = relevant_beliefs(candidate, existing);
        if pool.is_empty() {
            debug!(candidate = %candidate.temp_id, "No topical overlap, skipping evolution check");
            return EvolutionResult::none();
        }

        let prompt = relation_prompt(&self.prompt_template, candidate, &pool);
        match ask_judge(self.llm_client.as_ref(), prompt, self.params).await {
            Ok(Some(verdict)) => Self::interpret(&verdict, &pool),
            Ok(None) => EvolutionResult::none(),
            Err(e) => {
                warn!(candidate = %candidate.temp_id, error = %e, "Evolution check failed, assuming none");
                EvolutionResult::none()
            }
        }
    }

    fn interpret(verdict: &Value, pool: &[&Belief]) -> EvolutionResult {
        let explanation = explanation_of(verdict);
        if !flag_of(verdict, "hasEvolution") {
            return EvolutionResult {
                explanation,
                ..EvolutionResult::none()
            };
        }

        // A list is not a single parent
        let parent = verdict
            .get("evolvedFromId")
            .filter(|v| !v.is_array())
            .and_then(id_of)
            .filter(|id| pool.iter().any(|belief| &belief.id == id));

        match parent {
            Some(id) => EvolutionResult {
                has_evolution: true,
                evolved_from_id: Some(id),
                explanation,
            },
            None => {
                warn!("Discarding evolution verdict without a usable parent id");
                EvolutionResult::none()
            }
        }
    }
}
