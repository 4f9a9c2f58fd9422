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

//! Read-only graph view
//!
//! Node/edge lists and aggregate counts consumed by the presentation layer.
//! Layout and drawing are not this crate's concern.

use crate::belief::{Belief, BeliefType};
use crate::edge::{RelationEdge, RelationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A belief as a graph node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub confidence: u8,
    pub topics: Vec<String>,
    #[serde(rename = "type")]
    pub node_type: BeliefType,
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Belief> for GraphNode {
    fn from(belief: &Belief) -> Self {
        Self {
            id: belief.id.clone(),
            label: belief.text.clone(),
            confidence: belief.confidence,
            topics: belief.topics.clone(),
            node_type: belief.belief_type,
            deprecated: belief.deprecated,
            created_at: belief.created_at,
        }
    }
}

/// Nodes and edges of the belief graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<RelationEdge>,
}

impl GraphData {
    pub fn build(beliefs: &[Belief], edges: &[RelationEdge]) -> Self {
        Self {
            nodes: beliefs.iter().map(GraphNode::from).collect(),
            edges: edges.to_vec(),
        }
    }
}

/// Aggregate counts over the store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphStats {
    pub total_beliefs: usize,
    pub total_journal_entries: usize,
    pub total_connections: usize,
    pub belief_types: BTreeMap<String, usize>,
    pub connection_types: BTreeMap<String, usize>,
}

impl GraphStats {
    pub fn compute(beliefs: &[Belief], edges: &[RelationEdge], journal_entries: usize) -> Self {
        let mut belief_types: BTreeMap<String, usize> = BeliefType::all()
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        for belief in beliefs {
            *belief_types
                .entry(belief.belief_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut connection_types: BTreeMap<String, usize> = RelationKind::all()
            .iter()
            .map(|k| (k.as_str().to_string(), 0))
            .collect();
        for edge in edges {
            *connection_types
                .entry(edge.relation.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total_beliefs: beliefs.len(),
            total_journal_entries: journal_entries,
            total_connections: edges.len(),
            belief_types,
            connection_types,
        }
    }
}
