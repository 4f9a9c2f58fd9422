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

//! Journal processing
//!
//! One submission flows through extract -> relation checks -> merge. Checks
//! for different candidates run concurrently, bounded by
//! `pipeline.max_concurrent_checks`; the two checks of one candidate are
//! joined together. Every check reads the same snapshot of existing beliefs.

use crate::config::{PipelineSettings, SagemapConfig};
use crate::error::PipelineError;
use crate::extractor::BeliefExtractor;
use crate::llm_client::LLMClient;
use crate::merge::{merge, CheckedCandidate, ProcessedBelief};
use crate::relations::{ContradictionChecker, EvolutionChecker};
use futures::stream::{self, StreamExt};
use sagemap_core::{Belief, BeliefStore, CandidateBelief, JournalEntry, RelationEdge};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A journal entry submitted for processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSubmission {
    pub content: String,
    /// Snapshot of the caller's persisted beliefs
    #[serde(default)]
    pub existing_beliefs: Vec<Belief>,
    /// Per-request key; falls back to the configured key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Result of a successfully processed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalOutcome {
    pub journal_entry: JournalEntry,
    pub beliefs: Vec<ProcessedBelief>,
    /// All new edges, without duplicates
    pub edges: Vec<RelationEdge>,
    pub message: String,
}

impl JournalOutcome {
    /// The merged beliefs without their relation verdicts
    pub fn new_beliefs(&self) -> Vec<Belief> {
        self.beliefs.iter().map(|p| p.belief.clone()).collect()
    }
}

/// Processing failed; the entry is returned unprocessed
#[derive(Debug, Error)]
#[error("{message}")]
pub struct JournalFailure {
    pub journal_entry: JournalEntry,
    pub message: String,
    #[source]
    pub error: PipelineError,
}

impl JournalFailure {
    fn new(journal_entry: JournalEntry, error: PipelineError) -> Self {
        Self {
            journal_entry,
            message: error.user_message(),
            error,
        }
    }

    pub fn is_api_key_problem(&self) -> bool {
        self.error.is_api_key_problem()
    }

    /// Wire form handed back to the caller
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "journalEntry": self.journal_entry,
            "error": self.message,
            "apiKeyProblem": self.is_api_key_problem(),
        })
    }
}

/// Extract -> check -> merge for one journal entry
pub struct JournalPipeline {
    extractor: BeliefExtractor,
    contradiction: ContradictionChecker,
    evolution: EvolutionChecker,
    settings: PipelineSettings,
}

impl JournalPipeline {
    pub fn new(llm_client: Arc<dyn LLMClient>, config: &SagemapConfig) -> Self {
        Self {
            extractor: BeliefExtractor::new(llm_client.clone())
                .with_params(config.extraction)
                .with_max_beliefs(config.pipeline.max_beliefs),
            contradiction: ContradictionChecker::new(llm_client.clone())
                .with_params(config.relations),
            evolution: EvolutionChecker::new(llm_client).with_params(config.relations),
            settings: config.pipeline.clone(),
        }
    }

    /// Process one entry against the caller's belief snapshot.
    ///
    /// The returned beliefs and edges are not written anywhere; `store` is
    /// only asked for durable ids.
    pub async fn process(
        &self,
        content: &str,
        existing: &[Belief],
        store: &dyn BeliefStore,
    ) -> Result<JournalOutcome, JournalFailure> {
        let entry = JournalEntry::new(content);
        if content.trim().is_empty() {
            return Err(JournalFailure::new(
                entry,
                PipelineError::InvalidInput("journal content is empty".to_string()),
            ));
        }

        let candidates = match self.extractor.extract(content).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(entry = %entry.id, error = %e, "Belief extraction failed");
                return Err(JournalFailure::new(entry, e.into()));
            }
        };

        let mut pool = existing.to_vec();
        if self.settings.compare_within_entry {
            pool.extend(candidates.iter().map(|c| c.as_provisional_belief(&entry.id)));
        }

        let checked = self.check_candidates(candidates, &pool).await;

        let delta = match merge(store, &entry.id, existing, checked).await {
            Ok(delta) => delta,
            Err(e) => {
                warn!(entry = %entry.id, error = %e, "Merge failed");
                return Err(JournalFailure::new(entry, e.into()));
            }
        };

        info!(
            entry = %entry.id,
            beliefs = delta.beliefs.len(),
            edges = delta.edges.len(),
            "Processed journal entry"
        );

        Ok(JournalOutcome {
            message: format!(
                "Extracted {} beliefs from your journal entry",
                delta.beliefs.len()
            ),
            journal_entry: entry.mark_processed(),
            beliefs: delta.beliefs,
            edges: delta.edges,
        })
    }

    async fn check_candidates(
        &self,
        candidates: Vec<CandidateBelief>,
        pool: &[Belief],
    ) -> Vec<CheckedCandidate> {
        let limit = self.settings.max_concurrent_checks.max(1);

        stream::iter(candidates)
            .map(move |candidate| async move {
                let (contradiction, evolution) = tokio::join!(
                    self.contradiction.check(&candidate, pool),
                    self.evolution.check(&candidate, pool),
                );
                CheckedCandidate {
                    candidate,
                    contradiction,
                    evolution,
                }
            })
            .buffered(limit)
            .collect()
            .await
    }
}

/// Resolve the key, build the client and process `submission`.
///
/// A missing key fails before any model call.
pub async fn process_submission(
    config: &SagemapConfig,
    submission: &JournalSubmission,
    store: &dyn BeliefStore,
) -> Result<JournalOutcome, JournalFailure> {
    let client = match config.model.build_client(submission.api_key.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            return Err(JournalFailure::new(
                JournalEntry::new(submission.content.clone()),
                e,
            ))
        }
    };

    JournalPipeline::new(client, config)
        .process(&submission.content, &submission.existing_beliefs, store)
        .await
}
