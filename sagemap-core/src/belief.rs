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

//! Beliefs and candidate beliefs
//!
//! A [`Belief`] is a persisted statement of personal conviction. A
//! [`CandidateBelief`] is what the extraction step proposes before the store
//! has assigned a durable id; it carries a temporary id so that relations
//! found within the same request can point at it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque belief identifier, assigned by the belief store
pub type BeliefId = String;

/// Lowest confidence a belief can carry
pub const MIN_CONFIDENCE: u8 = 1;

/// Highest confidence a belief can carry
pub const MAX_CONFIDENCE: u8 = 10;

/// Prefix for temporary candidate ids
const TEMP_ID_PREFIX: &str = "tmp-";

/// Classification of a belief
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BeliefType {
    /// Fundamental value guiding major decisions
    Core,
    /// Idea taken for granted without evidence
    Assumption,
    /// Conclusion formed from experience or reasoning
    Derived,
}

impl BeliefType {
    /// Lenient parse of a model-provided label
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" | "core_belief" | "value" => Some(BeliefType::Core),
            "assumption" | "assumed" => Some(BeliefType::Assumption),
            "derived" | "conclusion" | "opinion" => Some(BeliefType::Derived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BeliefType::Core => "core",
            BeliefType::Assumption => "assumption",
            BeliefType::Derived => "derived",
        }
    }

    pub fn all() -> [BeliefType; 3] {
        [BeliefType::Core, BeliefType::Assumption, BeliefType::Derived]
    }
}

/// A persisted belief node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Belief {
    pub id: BeliefId,
    pub text: String,
    /// Conviction strength, 1-10
    pub confidence: u8,
    /// Free-text topic labels used for relevance pre-filtering
    pub topics: Vec<String>,
    pub belief_type: BeliefType,
    /// Journal entry that produced this belief
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evolved_from: Option<BeliefId>,
    pub created_at: DateTime<Utc>,
    /// Set when a later belief supersedes this one. Never set by the pipeline.
    #[serde(default)]
    pub deprecated: bool,
}

impl Belief {
    /// True if this belief carries at least one of `topics` (case-insensitive)
    pub fn shares_topic_with(&self, topics: &[String]) -> bool {
        self.topics.iter().any(|mine| {
            let mine = normalize_topic(mine);
            topics.iter().any(|other| normalize_topic(other) == mine)
        })
    }

    pub fn is_active(&self) -> bool {
        !self.deprecated
    }
}

/// A model-proposed belief that has not been persisted yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateBelief {
    /// Request-scoped id, replaced by a durable id at merge time
    pub temp_id: String,
    pub text: String,
    pub confidence: u8,
    pub topics: Vec<String>,
    pub belief_type: BeliefType,
}

impl CandidateBelief {
    /// Create a candidate with a fresh temporary id.
    ///
    /// Confidence is clamped to 1-10 and topics are normalized and
    /// de-duplicated, keeping first-seen order.
    pub fn new(
        text: impl Into<String>,
        confidence: i64,
        topics: impl IntoIterator<Item = impl AsRef<str>>,
        belief_type: BeliefType,
    ) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for topic in topics {
            let topic = normalize_topic(topic.as_ref());
            if !topic.is_empty() && !normalized.contains(&topic) {
                normalized.push(topic);
            }
        }

        Self {
            temp_id: format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4().simple()),
            text: text.into().trim().to_string(),
            confidence: confidence.clamp(MIN_CONFIDENCE as i64, MAX_CONFIDENCE as i64) as u8,
            topics: normalized,
            belief_type,
        }
    }

    /// Whether `id` has the shape of a temporary candidate id
    pub fn is_temp_id(id: &str) -> bool {
        id.starts_with(TEMP_ID_PREFIX)
    }

    /// View this candidate as a belief keyed by its temporary id, so that
    /// sibling candidates can be compared against it.
    pub fn as_provisional_belief(&self, source: &str) -> Belief {
        Belief {
            id: self.temp_id.clone(),
            text: self.text.clone(),
            confidence: self.confidence,
            topics: self.topics.clone(),
            belief_type: self.belief_type,
            source: source.to_string(),
            evolved_from: None,
            created_at: Utc::now(),
            deprecated: false,
        }
    }

    /// Materialize the persisted belief once the store has assigned `id`
    pub fn into_belief(
        self,
        id: BeliefId,
        source: &str,
        evolved_from: Option<BeliefId>,
    ) -> Belief {
        Belief {
            id,
            text: self.text,
            confidence: self.confidence,
            topics: self.topics,
            belief_type: self.belief_type,
            source: source.to_string(),
            evolved_from,
            created_at: Utc::now(),
            deprecated: false,
        }
    }
}

/// Canonical form of a topic label: trimmed and lower-cased
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}
