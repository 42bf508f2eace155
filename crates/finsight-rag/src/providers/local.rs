//! In-memory passage store for the local backend
//!
//! Passages are partitioned by namespace at insert time, so a search only ever
//! scans the partition it was asked for.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::passage::sort_by_relevance;
use crate::types::{Passage, Scope};

use super::passage_store::PassageStore;

struct StoredPassage {
    id: String,
    values: Vec<f32>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// One line of a JSONL snapshot
#[derive(Deserialize)]
struct SnapshotRecord {
    namespace: String,
    id: String,
    values: Vec<f32>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Namespace-partitioned cosine similarity store
#[derive(Default)]
pub struct InMemoryPassageStore {
    namespaces: RwLock<HashMap<String, Vec<StoredPassage>>>,
}

impl InMemoryPassageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSONL snapshot (`{"namespace","id","values","metadata"}` per line)
    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;

        let store = Self::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: SnapshotRecord = serde_json::from_str(line).map_err(|e| {
                Error::Config(format!(
                    "Invalid snapshot record at {}:{}: {}",
                    path.display(),
                    lineno + 1,
                    e
                ))
            })?;
            store.insert(&record.namespace, record.id, record.values, record.metadata);
        }

        tracing::info!(
            path = %path.display(),
            passages = store.len(),
            "loaded passage snapshot"
        );
        Ok(store)
    }

    /// Add a passage under a namespace (upper-cased to match ticker scopes)
    pub fn insert(
        &self,
        namespace: &str,
        id: impl Into<String>,
        values: Vec<f32>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) {
        self.namespaces
            .write()
            .entry(namespace.trim().to_uppercase())
            .or_default()
            .push(StoredPassage {
                id: id.into(),
                values,
                metadata,
            });
    }

    /// Total passages across all namespaces
    pub fn len(&self) -> usize {
        self.namespaces.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl PassageStore for InMemoryPassageStore {
    async fn search(
        &self,
        query: &[f32],
        namespace: &Scope,
        top_k: usize,
    ) -> Result<Vec<Passage>> {
        let namespaces = self.namespaces.read();
        let Some(partition) = namespaces.get(namespace.as_str()) else {
            return Ok(Vec::new());
        };

        let mut passages = Vec::with_capacity(partition.len());
        for stored in partition {
            if stored.values.len() != query.len() {
                return Err(Error::DimensionMismatch {
                    expected: stored.values.len(),
                    actual: query.len(),
                });
            }
            let score = cosine_similarity(query, &stored.values);
            passages.push(Passage::from_metadata(stored.id.clone(), score, &stored.metadata));
        }

        sort_by_relevance(&mut passages);
        passages.truncate(top_k);
        Ok(passages)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
