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

//! Seam between the extraction pipeline and whatever owns persisted beliefs

use crate::belief::BeliefId;
use crate::error::Result;
use async_trait::async_trait;

/// The belief store as seen by the merge step.
///
/// The pipeline only asks for durable identifiers. Writing the finished
/// beliefs and edges is left to the store's owner.
#[async_trait]
pub trait BeliefStore: Send + Sync {
    /// Reserve a durable id for a belief about to be persisted.
    /// Ids must never repeat within a store.
    async fn reserve_belief_id(&self) -> Result<BeliefId>;
}
