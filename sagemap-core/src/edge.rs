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

//! Relation edges between beliefs

use crate::belief::BeliefId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Relationship kinds between beliefs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Source and target make mutually exclusive claims
    Contradicts,
    /// Source supports target
    Reinforces,
    /// Source is a refinement of target
    EvolvedFrom,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Contradicts => "contradicts",
            RelationKind::Reinforces => "reinforces",
            RelationKind::EvolvedFrom => "evolved_from",
        }
    }

    pub fn all() -> [RelationKind; 3] {
        [
            RelationKind::Contradicts,
            RelationKind::Reinforces,
            RelationKind::EvolvedFrom,
        ]
    }
}

/// Directed edge `source -> target`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RelationEdge {
    pub source: BeliefId,
    pub target: BeliefId,
    pub relation: RelationKind,
}

impl RelationEdge {
    pub fn new(
        source: impl Into<BeliefId>,
        target: impl Into<BeliefId>,
        relation: RelationKind,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation,
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// Insertion-ordered edge collection without exact duplicates
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    edges: Vec<RelationEdge>,
    seen: HashSet<RelationEdge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge, returning false if the same
    /// (source, target, relation) triple is already present
    pub fn insert(&mut self, edge: RelationEdge) -> bool {
        if self.seen.contains(&edge) {
            return false;
        }
        self.seen.insert(edge.clone());
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, edge: &RelationEdge) -> bool {
        self.seen.contains(edge)
    }

    /// Remove an edge, returning whether it was present
    pub fn remove(&mut self, edge: &RelationEdge) -> bool {
        if !self.seen.remove(edge) {
            return false;
        }
        self.edges.retain(|e| e != edge);
        true
    }

    /// Drop every edge touching `id`
    pub fn remove_touching(&mut self, id: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        self.seen.retain(|e| !e.touches(id));
        before - self.edges.len()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationEdge> {
        self.edges.iter()
    }

    pub fn into_vec(self) -> Vec<RelationEdge> {
        self.edges
    }
}

impl FromIterator<RelationEdge> for EdgeSet {
    fn from_iter<I: IntoIterator<Item = RelationEdge>>(iter: I) -> Self {
        let mut set = EdgeSet::new();
        for edge in iter {
            set.insert(edge);
        }
        set
    }
}
