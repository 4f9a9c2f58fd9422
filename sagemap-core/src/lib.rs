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

//! Sagemap Core
//!
//! Data model for the personal belief graph: beliefs (nodes), relation
//! edges, journal entries and the read-only graph view handed to
//! presentation layers.

pub mod belief;
pub mod edge;
pub mod error;
pub mod graph;
pub mod journal;
pub mod store;

pub use belief::{normalize_topic, Belief, BeliefId, BeliefType, CandidateBelief};
pub use edge::{EdgeSet, RelationEdge, RelationKind};
pub use error::{CoreError, Result};
pub use graph::{GraphData, GraphNode, GraphStats};
pub use journal::JournalEntry;
pub use store::BeliefStore;
