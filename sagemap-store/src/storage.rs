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

//! Storage layer for the belief graph
//!
//! All state sits behind one lock. A mutation is applied to a copy of the
//! state, and the copy replaces the live state only once its snapshot has
//! been written, so a failed write leaves the store unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sagemap_core::{
    Belief, BeliefId, BeliefStore, BeliefType, CandidateBelief, CoreError, EdgeSet, GraphData,
    GraphStats, JournalEntry, RelationEdge, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Full dump of the store; also the on-disk snapshot format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub beliefs: Vec<Belief>,
    pub edges: Vec<RelationEdge>,
    pub journal_entries: Vec<JournalEntry>,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
}

/// Partial update of a belief; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeliefUpdate {
    pub text: Option<String>,
    pub confidence: Option<u8>,
    pub topics: Option<Vec<String>>,
    pub belief_type: Option<BeliefType>,
    pub deprecated: Option<bool>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    beliefs: HashMap<BeliefId, Belief>,
    edges: EdgeSet,
    journal_entries: HashMap<String, JournalEntry>,
    /// Ids handed out by `reserve_belief_id` and not yet used. Not persisted;
    /// released when a commit using them fails or through `release_reserved_ids`.
    reserved: HashSet<BeliefId>,
}

impl StoreState {
    fn from_export(data: ExportData) -> Self {
        Self {
            beliefs: data.beliefs.into_iter().map(|b| (b.id.clone(), b)).collect(),
            edges: data.edges.into_iter().collect(),
            journal_entries: data
                .journal_entries
                .into_iter()
                .map(|e| (e.id.clone(), e))
                .collect(),
            reserved: HashSet::new(),
        }
    }

    fn beliefs_newest_first(&self) -> Vec<Belief> {
        let mut beliefs: Vec<Belief> = self.beliefs.values().cloned().collect();
        beliefs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        beliefs
    }

    fn journal_newest_first(&self) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self.journal_entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries
    }

    fn export(&self) -> ExportData {
        ExportData {
            beliefs: self.beliefs_newest_first(),
            edges: self.edges.iter().cloned().collect(),
            journal_entries: self.journal_newest_first(),
            exported_at: Utc::now(),
        }
    }

    fn insert_belief(&mut self, belief: Belief) -> Result<()> {
        if self.beliefs.contains_key(&belief.id) {
            return Err(CoreError::StorageError(format!(
                "Belief already exists: {}",
                belief.id
            )));
        }
        self.reserved.remove(&belief.id);
        self.beliefs.insert(belief.id.clone(), belief);
        Ok(())
    }
}

/// Belief graph store, in memory or backed by a JSON snapshot file
#[derive(Debug)]
pub struct BeliefGraphStore {
    /// Snapshot path; `None` keeps everything in memory
    path: Option<PathBuf>,
    state: RwLock<StoreState>,
}

impl BeliefGraphStore {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if it exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            let data: ExportData = serde_json::from_str(&content)?;
            info!(
                path = %path.display(),
                beliefs = data.beliefs.len(),
                edges = data.edges.len(),
                "Loaded belief graph snapshot"
            );
            StoreState::from_export(data)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            StoreState::default()
        };

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `change` to a copy of the state, persist the copy and only then
    /// make it live.
    async fn mutate<T>(&self, change: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let value = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(value)
    }

    /// Insert a belief whose id was already assigned
    pub async fn insert_belief(&self, belief: Belief) -> Result<Belief> {
        self.mutate(|state| state.insert_belief(belief.clone())).await?;
        Ok(belief)
    }

    /// Create a belief from a candidate, assigning a fresh id
    pub async fn create_belief(&self, candidate: CandidateBelief, source: &str) -> Result<Belief> {
        let id = self.reserve_belief_id().await?;
        self.insert_belief(candidate.into_belief(id, source, None)).await
    }

    pub async fn get_belief(&self, id: &str) -> Option<Belief> {
        self.state.read().await.beliefs.get(id).cloned()
    }

    /// All beliefs, newest first
    pub async fn list_beliefs(&self) -> Vec<Belief> {
        self.state.read().await.beliefs_newest_first()
    }

    pub async fn update_belief(&self, id: &str, update: BeliefUpdate) -> Result<Belief> {
        self.mutate(|state| {
            let belief = state
                .beliefs
                .get_mut(id)
                .ok_or_else(|| CoreError::BeliefNotFound(id.to_string()))?;

            if let Some(text) = update.text {
                belief.text = text;
            }
            if let Some(confidence) = update.confidence {
                belief.confidence = confidence.clamp(
                    sagemap_core::belief::MIN_CONFIDENCE,
                    sagemap_core::belief::MAX_CONFIDENCE,
                );
            }
            if let Some(topics) = update.topics {
                belief.topics = topics;
            }
            if let Some(belief_type) = update.belief_type {
                belief.belief_type = belief_type;
            }
            if let Some(deprecated) = update.deprecated {
                belief.deprecated = deprecated;
            }
            Ok(belief.clone())
        })
        .await
    }

    /// Delete a belief and every edge touching it
    pub async fn delete_belief(&self, id: &str) -> Result<bool> {
        if self.get_belief(id).await.is_none() {
            return Ok(false);
        }
        self.mutate(|state| {
            if state.beliefs.remove(id).is_none() {
                return Ok(false);
            }
            let dropped = state.edges.remove_touching(id);
            debug!(id, dropped_edges = dropped, "Deleted belief");
            Ok(true)
        })
        .await
    }

    /// Add an edge unless the same (source, target, relation) is present
    pub async fn create_edge(&self, edge: RelationEdge) -> Result<bool> {
        if self.state.read().await.edges.contains(&edge) {
            return Ok(false);
        }
        self.mutate(|state| Ok(state.edges.insert(edge))).await
    }

    pub async fn list_edges(&self) -> Vec<RelationEdge> {
        self.state.read().await.edges.iter().cloned().collect()
    }

    /// Edges where `id` is the source or the target
    pub async fn edges_for_belief(&self, id: &str) -> Vec<RelationEdge> {
        self.state
            .read()
            .await
            .edges
            .iter()
            .filter(|e| e.touches(id))
            .cloned()
            .collect()
    }

    pub async fn delete_edge(&self, edge: &RelationEdge) -> Result<bool> {
        if !self.state.read().await.edges.contains(edge) {
            return Ok(false);
        }
        self.mutate(|state| Ok(state.edges.remove(edge))).await
    }

    pub async fn create_journal_entry(&self, content: &str) -> Result<JournalEntry> {
        let entry = JournalEntry::new(content);
        self.mutate(|state| {
            state.journal_entries.insert(entry.id.clone(), entry.clone());
            Ok(())
        })
        .await?;
        Ok(entry)
    }

    /// All journal entries, newest first
    pub async fn list_journal_entries(&self) -> Vec<JournalEntry> {
        self.state.read().await.journal_newest_first()
    }

    pub async fn mark_journal_entry_processed(&self, id: &str) -> Result<JournalEntry> {
        self.mutate(|state| {
            let entry = state
                .journal_entries
                .get_mut(id)
                .ok_or_else(|| CoreError::JournalEntryNotFound(id.to_string()))?;
            entry.processed = true;
            Ok(entry.clone())
        })
        .await
    }

    pub async fn delete_journal_entry(&self, id: &str) -> Result<bool> {
        if !self.state.read().await.journal_entries.contains_key(id) {
            return Ok(false);
        }
        self.mutate(|state| Ok(state.journal_entries.remove(id).is_some()))
            .await
    }

    /// Apply the result of processing one journal entry.
    ///
    /// The entry is stored as given (replacing an earlier copy with the same
    /// id), beliefs are inserted and edges added without duplicates. Returns
    /// the number of edges that were new. Either everything is applied and
    /// persisted or nothing is; on failure the reservations of the incoming
    /// belief ids are released.
    pub async fn commit(
        &self,
        entry: JournalEntry,
        beliefs: Vec<Belief>,
        edges: Vec<RelationEdge>,
    ) -> Result<usize> {
        let entry_id = entry.id.clone();
        let belief_ids: Vec<BeliefId> = beliefs.iter().map(|b| b.id.clone()).collect();
        let belief_count = beliefs.len();

        let result = self
            .mutate(|state| {
                let mut incoming = HashSet::new();
                for belief in &beliefs {
                    if state.beliefs.contains_key(&belief.id) || !incoming.insert(belief.id.as_str()) {
                        return Err(CoreError::StorageError(format!(
                            "Belief already exists: {}",
                            belief.id
                        )));
                    }
                }

                state.journal_entries.insert(entry.id.clone(), entry);
                for belief in beliefs {
                    state.insert_belief(belief)?;
                }
                Ok(edges
                    .into_iter()
                    .filter(|edge| state.edges.insert(edge.clone()))
                    .count())
            })
            .await;

        match result {
            Ok(new_edges) => {
                info!(
                    entry = %entry_id,
                    beliefs = belief_count,
                    edges = new_edges,
                    "Committed journal entry"
                );
                Ok(new_edges)
            }
            Err(e) => {
                self.release_reserved_ids(&belief_ids).await;
                Err(e)
            }
        }
    }

    /// Forget reservations for ids that will not be inserted, such as those
    /// of a dry run. Returns how many were still reserved.
    pub async fn release_reserved_ids(&self, ids: &[BeliefId]) -> usize {
        let mut state = self.state.write().await;
        let released = ids.iter().filter(|id| state.reserved.remove(*id)).count();
        if released > 0 {
            debug!(released, "Released reserved belief ids");
        }
        released
    }

    /// Node and edge lists for presentation
    pub async fn graph_data(&self) -> GraphData {
        let state = self.state.read().await;
        let edges: Vec<RelationEdge> = state.edges.iter().cloned().collect();
        GraphData::build(&state.beliefs_newest_first(), &edges)
    }

    pub async fn stats(&self) -> GraphStats {
        let state = self.state.read().await;
        let beliefs: Vec<Belief> = state.beliefs.values().cloned().collect();
        let edges: Vec<RelationEdge> = state.edges.iter().cloned().collect();
        GraphStats::compute(&beliefs, &edges, state.journal_entries.len())
    }

    pub async fn export(&self) -> ExportData {
        self.state.read().await.export()
    }

    /// Replace all contents with `data`
    pub async fn import(&self, data: ExportData) -> Result<()> {
        let mut state = self.state.write().await;
        let next = StoreState::from_export(data);
        self.persist(&next).await?;
        *state = next;
        info!(
            beliefs = state.beliefs.len(),
            edges = state.edges.len(),
            journal_entries = state.journal_entries.len(),
            "Imported belief graph"
        );
        Ok(())
    }

    /// Remove everything
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let next = StoreState::default();
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&state.export())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl BeliefStore for BeliefGraphStore {
    async fn reserve_belief_id(&self) -> Result<BeliefId> {
        let mut state = self.state.write().await;
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if !state.beliefs.contains_key(&id) && state.reserved.insert(id.clone()) {
                return Ok(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sagemap_core::RelationKind;
    use tempfile::tempdir;

    fn belief(id: &str, minutes_ago: i64) -> Belief {
        Belief {
            id: id.to_string(),
            text: format!("belief {}", id),
            confidence: 5,
            topics: vec!["money".to_string()],
            belief_type: BeliefType::Core,
            source: "j1".to_string(),
            evolved_from: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            deprecated: false,
        }
    }

    #[tokio::test]
    async fn test_belief_crud() {
        let store = BeliefGraphStore::in_memory();
        store.insert_belief(belief("old", 10)).await.unwrap();
        store.insert_belief(belief("new", 1)).await.unwrap();

        let listed: Vec<String> = store.list_beliefs().await.into_iter().map(|b| b.id).collect();
        assert_eq!(listed, vec!["new", "old"]);

        let updated = store
            .update_belief(
                "old",
                BeliefUpdate {
                    deprecated: Some(true),
                    confidence: Some(42),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.deprecated);
        assert_eq!(updated.confidence, 10);

        assert!(matches!(
            store.update_belief("ghost", BeliefUpdate::default()).await,
            Err(CoreError::BeliefNotFound(_))
        ));
        assert!(store.insert_belief(belief("new", 0)).await.is_err());

        assert!(store.delete_belief("old").await.unwrap());
        assert!(!store.delete_belief("old").await.unwrap());
        assert!(store.get_belief("old").await.is_none());
    }

    #[tokio::test]
    async fn test_create_belief_from_candidate() {
        let store = BeliefGraphStore::in_memory();
        let candidate = CandidateBelief::new("Rest is productive", 6, ["rest"], BeliefType::Derived);

        let created = store.create_belief(candidate, "j1").await.unwrap();
        assert!(!CandidateBelief::is_temp_id(&created.id));
        assert_eq!(store.get_belief(&created.id).await.unwrap().text, "Rest is productive");
    }

    #[tokio::test]
    async fn test_edges_deduplicated_and_cleaned_up() {
        let store = BeliefGraphStore::in_memory();
        store.insert_belief(belief("a", 2)).await.unwrap();
        store.insert_belief(belief("b", 1)).await.unwrap();

        let edge = RelationEdge::new("a", "b", RelationKind::Contradicts);
        assert!(store.create_edge(edge.clone()).await.unwrap());
        assert!(!store.create_edge(edge.clone()).await.unwrap());
        assert_eq!(store.list_edges().await.len(), 1);
        assert_eq!(store.edges_for_belief("b").await, vec![edge.clone()]);

        assert!(store.delete_edge(&edge).await.unwrap());
        assert!(store.list_edges().await.is_empty());

        store.create_edge(edge).await.unwrap();
        store.delete_belief("a").await.unwrap();
        assert!(store.list_edges().await.is_empty());
    }

    #[tokio::test]
    async fn test_journal_lifecycle() {
        let store = BeliefGraphStore::in_memory();
        let entry = store.create_journal_entry("Today I realised...").await.unwrap();
        assert!(!entry.processed);

        let processed = store.mark_journal_entry_processed(&entry.id).await.unwrap();
        assert!(processed.processed);
        assert!(store.list_journal_entries().await[0].processed);

        assert!(matches!(
            store.mark_journal_entry_processed("ghost").await,
            Err(CoreError::JournalEntryNotFound(_))
        ));
        assert!(store.delete_journal_entry(&entry.id).await.unwrap());
        assert!(store.list_journal_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_reserved_ids_are_unique() {
        let store = BeliefGraphStore::in_memory();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(store.reserve_belief_id().await.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_commit_applies_entry_beliefs_and_edges() {
        let store = BeliefGraphStore::in_memory();
        store.insert_belief(belief("e1", 60)).await.unwrap();

        let entry = JournalEntry::new("I think money buys happiness.").mark_processed();
        let id = store.reserve_belief_id().await.unwrap();
        let edges = vec![
            RelationEdge::new(id.clone(), "e1", RelationKind::Contradicts),
            RelationEdge::new(id.clone(), "e1", RelationKind::Contradicts),
        ];

        let new_edges = store
            .commit(entry.clone(), vec![belief(&id, 0)], edges)
            .await
            .unwrap();

        assert_eq!(new_edges, 1);
        let stats = store.stats().await;
        assert_eq!(stats.total_beliefs, 2);
        assert_eq!(stats.total_journal_entries, 1);
        assert_eq!(stats.connection_types["contradicts"], 1);
        assert_eq!(store.list_journal_entries().await, vec![entry]);
    }

    #[tokio::test]
    async fn test_commit_rejects_existing_ids_atomically() {
        let store = BeliefGraphStore::in_memory();
        store.insert_belief(belief("e1", 60)).await.unwrap();

        let result = store
            .commit(JournalEntry::new("x"), vec![belief("fresh", 0), belief("e1", 0)], vec![])
            .await;

        assert!(result.is_err());
        assert!(store.get_belief("fresh").await.is_none());
        assert!(store.list_journal_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let path = data_dir.join("sagemap.json");
        let store = BeliefGraphStore::open(&path).await.unwrap();
        store.insert_belief(belief("kept", 5)).await.unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();

        let id = store.reserve_belief_id().await.unwrap();
        let result = store
            .commit(JournalEntry::new("lost"), vec![belief(&id, 0)], vec![])
            .await;
        assert!(result.is_err());
        assert!(store.get_belief(&id).await.is_none());
        assert!(store.list_journal_entries().await.is_empty());
        assert!(store.state.read().await.reserved.is_empty());

        assert!(store
            .update_belief("kept", BeliefUpdate { deprecated: Some(true), ..Default::default() })
            .await
            .is_err());
        assert!(!store.get_belief("kept").await.unwrap().deprecated);
        assert!(store.clear().await.is_err());
        assert!(store.get_belief("kept").await.is_some());

        // The next successful write must not carry the rejected commit
        std::fs::create_dir_all(&data_dir).unwrap();
        store.insert_belief(belief("later", 0)).await.unwrap();

        let reopened = BeliefGraphStore::open(&path).await.unwrap();
        let ids: Vec<String> = reopened.list_beliefs().await.into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["later", "kept"]);
        assert!(reopened.list_journal_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_unused_reservations_are_released() {
        let store = BeliefGraphStore::in_memory();
        store.insert_belief(belief("e1", 60)).await.unwrap();

        let used = store.reserve_belief_id().await.unwrap();
        store
            .commit(JournalEntry::new("a"), vec![belief(&used, 0)], vec![])
            .await
            .unwrap();
        assert!(store.state.read().await.reserved.is_empty());

        let rejected = store.reserve_belief_id().await.unwrap();
        let result = store
            .commit(JournalEntry::new("b"), vec![belief(&rejected, 0), belief("e1", 0)], vec![])
            .await;
        assert!(result.is_err());
        assert!(store.state.read().await.reserved.is_empty());

        let dry_run = vec![
            store.reserve_belief_id().await.unwrap(),
            store.reserve_belief_id().await.unwrap(),
        ];
        assert_eq!(store.release_reserved_ids(&dry_run).await, 2);
        assert_eq!(store.release_reserved_ids(&dry_run).await, 0);
        assert!(store.state.read().await.reserved.is_empty());
    }

    #[tokio::test]
    async fn test_graph_data_and_clear() {
        let store = BeliefGraphStore::in_memory();
        store.insert_belief(belief("a", 2)).await.unwrap();
        store
            .create_edge(RelationEdge::new("a", "a2", RelationKind::EvolvedFrom))
            .await
            .unwrap();

        let data = store.graph_data().await;
        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.nodes[0].label, "belief a");
        assert_eq!(data.edges.len(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.stats().await.total_beliefs, 0);
        assert!(store.graph_data().await.edges.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("sagemap.json");

        {
            let store = BeliefGraphStore::open(&path).await.unwrap();
            store.insert_belief(belief("a", 1)).await.unwrap();
            store
                .create_edge(RelationEdge::new("a", "b", RelationKind::Contradicts))
                .await
                .unwrap();
            store.create_journal_entry("entry").await.unwrap();
        }

        let reopened = BeliefGraphStore::open(&path).await.unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        let stats = reopened.stats().await;
        assert_eq!(stats.total_beliefs, 1);
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.total_journal_entries, 1);
    }

    #[tokio::test]
    async fn test_export_import() {
        let source = BeliefGraphStore::in_memory();
        source.insert_belief(belief("a", 1)).await.unwrap();
        source
            .create_edge(RelationEdge::new("a", "b", RelationKind::Contradicts))
            .await
            .unwrap();
        let exported = source.export().await;

        let json = serde_json::to_value(&exported).unwrap();
        assert!(json.get("journal_entries").is_some());
        assert!(json.get("exported_at").is_some());

        let target = BeliefGraphStore::in_memory();
        target.insert_belief(belief("stale", 1)).await.unwrap();
        target.import(exported).await.unwrap();

        assert!(target.get_belief("stale").await.is_none());
        assert!(target.get_belief("a").await.is_some());
        assert_eq!(target.list_edges().await.len(), 1);
    }

    #[test]
    fn test_import_without_timestamp() {
        let data: ExportData =
            serde_json::from_str(r#"{"beliefs": [], "edges": [], "journal_entries": []}"#).unwrap();
        assert!(data.beliefs.is_empty());
    }
}
