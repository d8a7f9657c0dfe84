use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::Embedding;
use crate::faces::similarity::{similarity, SimilarityError};
use crate::faces::store::{IdentityRecord, PersistentStore};

type RecordMap = BTreeMap<String, IdentityRecord>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMatch {
    pub name: String,
    pub score: f64,
}

/// Immutable view of the repository at one point in time.
///
/// Iteration is in name order, which also fixes the tie-break of
/// [`Snapshot::find_most_similar`]: among equal top scores the
/// lexicographically smallest name wins.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Arc<RecordMap>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityRecord> {
        self.records.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Dimensionality shared by every record, if any are present.
    pub fn dimension(&self) -> Option<usize> {
        self.records.values().next().map(|record| record.embedding.len())
    }

    pub fn find_most_similar(&self, candidate: &Embedding) -> Option<BestMatch> {
        let mut best: Option<BestMatch> = None;
        for record in self.records.values() {
            let score = match similarity(candidate, &record.embedding) {
                Ok(score) => score,
                Err(SimilarityError::DegenerateVector) => {
                    debug!(identity = %record.name, "skipping degenerate comparison");
                    continue;
                }
                Err(err @ SimilarityError::DimensionMismatch { .. }) => {
                    warn!(identity = %record.name, error = %err, "skipping incomparable record");
                    continue;
                }
            };
            if best.as_ref().map_or(true, |current| score > current.score) {
                best = Some(BestMatch {
                    name: record.name.clone(),
                    score,
                });
            }
        }
        best
    }
}

/// Name to embedding mapping with copy-on-write snapshots.
///
/// Readers never block on writers for longer than an `Arc` clone and always see
/// whole records. Writers are serialized through [`EmbeddingRepository::begin_write`].
pub struct EmbeddingRepository {
    current: RwLock<Arc<RecordMap>>,
    writer: Mutex<()>,
    store: Option<Arc<dyn PersistentStore>>,
}

impl Default for EmbeddingRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingRepository {
    /// Repository with no durable backing.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RecordMap::new())),
            writer: Mutex::new(()),
            store: None,
        }
    }

    /// Bulk-loads every record from `store` and writes through to it afterwards.
    pub fn load(store: Arc<dyn PersistentStore>) -> AppResult<Self> {
        let records = build_map(store.load_all()?)?;
        info!(count = records.len(), "loaded enrolled identities");
        Ok(Self {
            current: RwLock::new(Arc::new(records)),
            writer: Mutex::new(()),
            store: Some(store),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            records: self.current.read().clone(),
        }
    }

    pub fn all(&self) -> Vec<(String, Embedding)> {
        self.snapshot()
            .iter()
            .map(|record| (record.name.clone(), record.embedding.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.current.read().contains_key(name)
    }

    pub fn find_most_similar(&self, candidate: &Embedding) -> Option<BestMatch> {
        self.snapshot().find_most_similar(candidate)
    }

    pub fn upsert(&self, name: &str, embedding: Embedding) -> AppResult<()> {
        self.begin_write().upsert(name, embedding)
    }

    /// Takes the single-writer lock. Checks made through the returned writer
    /// cannot be invalidated by another writer before it is dropped.
    pub fn begin_write(&self) -> RepositoryWriter<'_> {
        RepositoryWriter {
            repo: self,
            _guard: self.writer.lock(),
        }
    }
}

pub struct RepositoryWriter<'a> {
    repo: &'a EmbeddingRepository,
    _guard: MutexGuard<'a, ()>,
}

impl RepositoryWriter<'_> {
    pub fn snapshot(&self) -> Snapshot {
        self.repo.snapshot()
    }

    /// Persists first, then publishes; a failed store write changes nothing.
    pub fn upsert(&self, name: &str, embedding: Embedding) -> AppResult<()> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidIdentity {
                name: name.to_string(),
                message: "identity name cannot be empty".into(),
            });
        }
        embedding.validate()?;

        let current = self.repo.snapshot();
        let expected = current
            .iter()
            .find(|record| record.name != name)
            .map(|record| record.embedding.len());
        if let Some(expected) = expected {
            if expected != embedding.len() {
                return Err(AppError::DimensionMismatch {
                    expected,
                    found: embedding.len(),
                });
            }
        }

        let record = IdentityRecord {
            name: name.to_string(),
            embedding,
            enrolled_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        if let Some(store) = &self.repo.store {
            store.save(&record)?;
        }

        let mut next = RecordMap::clone(&current.records);
        let replaced = next.insert(record.name.clone(), record).is_some();
        *self.repo.current.write() = Arc::new(next);
        debug!(identity = %name, replaced, "published identity");
        Ok(())
    }
}

fn build_map(records: Vec<IdentityRecord>) -> AppResult<RecordMap> {
    let mut map = RecordMap::new();
    let mut expected: Option<usize> = None;
    for record in records {
        record.embedding.validate()?;
        match expected {
            Some(len) if len != record.embedding.len() => {
                return Err(AppError::DimensionMismatch {
                    expected: len,
                    found: record.embedding.len(),
                });
            }
            _ => expected = Some(record.embedding.len()),
        }
        map.insert(record.name.clone(), record);
    }
    Ok(map)
}
