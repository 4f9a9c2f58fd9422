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

//! Graph merge step
//!
//! Assigns durable ids to checked candidates and turns relation verdicts into
//! edges. Every candidate gets its id before any edge is resolved, because a
//! verdict may name another candidate of the same batch by its temporary id.

use crate::relations::{ContradictionResult, EvolutionResult};
use sagemap_core::{
    Belief, BeliefId, BeliefStore, CandidateBelief, EdgeSet, RelationEdge, RelationKind,
    Result,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A candidate together with both relation verdicts
#[derive(Debug, Clone)]
pub struct CheckedCandidate {
    pub candidate: CandidateBelief,
    pub contradiction: ContradictionResult,
    pub evolution: EvolutionResult,
}

/// A merged belief with the edges it originates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedBelief {
    #[serde(flatten)]
    pub belief: Belief,
    pub edges: Vec<RelationEdge>,
    pub contradiction: ContradictionResult,
    pub evolution: EvolutionResult,
}

/// New beliefs and new edges produced by one merge
#[derive(Debug, Clone, Default)]
pub struct GraphDelta {
    pub beliefs: Vec<ProcessedBelief>,
    /// Every new edge, without duplicates, in proposal order
    pub edges: Vec<RelationEdge>,
}

/// Resolves verdict ids to durable ids
struct IdResolver<'a> {
    temp_to_durable: HashMap<String, BeliefId>,
    batch: HashSet<BeliefId>,
    existing: HashSet<&'a str>,
}

impl<'a> IdResolver<'a> {
    fn resolve(&self, id: &str) -> Option<BeliefId> {
        if let Some(durable) = self.temp_to_durable.get(id) {
            return Some(durable.clone());
        }
        if self.existing.contains(id) || self.batch.contains(id) {
            return Some(id.to_string());
        }
        None
    }
}

/// Merge checked candidates into a graph delta.
///
/// `existing` is the snapshot the candidates were checked against. Edges
/// whose target resolves to neither a batch belief nor an existing belief are
/// dropped, as are self-edges and an evolution edge whose reverse was already
/// kept. The verdicts returned with each belief are rewritten the same way,
/// so they only name durable ids.
pub async fn merge(
    store: &dyn BeliefStore,
    source: &str,
    existing: &[Belief],
    checked: Vec<CheckedCandidate>,
) -> Result<GraphDelta> {
    // Step 1: durable ids for everyone
    let mut temp_to_durable = HashMap::with_capacity(checked.len());
    for item in &checked {
        let durable = store.reserve_belief_id().await?;
        temp_to_durable.insert(item.candidate.temp_id.clone(), durable);
    }

    let resolver = IdResolver {
        batch: temp_to_durable.values().cloned().collect(),
        temp_to_durable,
        existing: existing.iter().map(|b| b.id.as_str()).collect(),
    };

    // Step 2: edges
    let mut all_edges = EdgeSet::new();
    let mut beliefs = Vec::with_capacity(checked.len());

    for item in checked {
        let Some(own_id) = resolver.resolve(&item.candidate.temp_id) else {
            continue;
        };
        let mut own_edges = Vec::new();

        // Returns the resolved target when the relation stands, even if the
        // identical edge was already proposed.
        let mut propose = |target: &str, relation: RelationKind| -> Option<BeliefId> {
            let Some(target) = resolver.resolve(target) else {
                warn!(
                    source = %own_id,
                    to = %target,
                    relation = relation.as_str(),
                    "Dropping edge to unknown belief"
                );
                return None;
            };
            if target == own_id {
                debug!(id = %own_id, relation = relation.as_str(), "Dropping self-edge");
                return None;
            }
            if relation == RelationKind::EvolvedFrom
                && all_edges.contains(&RelationEdge::new(target.clone(), own_id.clone(), relation))
            {
                debug!(source = %own_id, to = %target, "Dropping evolution cycle");
                return None;
            }
            let edge = RelationEdge::new(own_id.clone(), target.clone(), relation);
            if all_edges.insert(edge.clone()) {
                own_edges.push(edge);
            }
            Some(target)
        };

        let mut contradiction = item.contradiction;
        if contradiction.has_contradiction {
            let mut resolved: Vec<BeliefId> = Vec::new();
            for id in &contradiction.contradicting_ids {
                if let Some(target) = propose(id.as_str(), RelationKind::Contradicts) {
                    if !resolved.contains(&target) {
                        resolved.push(target);
                    }
                }
            }
            contradiction.has_contradiction = !resolved.is_empty();
            contradiction.contradicting_ids = resolved;
        } else {
            contradiction.contradicting_ids.clear();
        }

        let mut evolution = item.evolution;
        let evolved_from = match (evolution.has_evolution, &evolution.evolved_from_id) {
            (true, Some(parent)) => propose(parent.as_str(), RelationKind::EvolvedFrom),
            _ => None,
        };
        evolution.has_evolution = evolved_from.is_some();
        evolution.evolved_from_id = evolved_from.clone();

        let belief = item.candidate.into_belief(own_id, source, evolved_from);
        beliefs.push(ProcessedBelief {
            belief,
            edges: own_edges,
            contradiction,
            evolution,
        });
    }

    debug!(
        beliefs = beliefs.len(),
        edges = all_edges.len(),
        "Merged candidates into graph delta"
    );

    Ok(GraphDelta {
        beliefs,
        edges: all_edges.into_vec(),
    })
}
