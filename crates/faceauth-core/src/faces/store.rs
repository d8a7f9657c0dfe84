use std::env;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::{Embedding, EMBEDDING_ENCODING};

const DEFAULT_STORE_PATH: &str = "/var/lib/faceauth/embeddings.json";
const STORE_PATH_ENV: &str = "FACEAUTH_STORE_PATH";
const STORE_VERSION: u32 = 1;

/// One enrolled identity. Replaced wholesale on re-enrollment, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRecord {
    pub name: String,
    pub embedding: Embedding,
    pub enrolled_at: String,
}

/// Durable backing for the embedding repository.
pub trait PersistentStore: Send + Sync {
    /// Inserts or replaces the record with the same name.
    fn save(&self, record: &IdentityRecord) -> AppResult<()>;
    fn load_all(&self) -> AppResult<Vec<IdentityRecord>>;
}

pub trait StorePathResolver {
    fn resolve(&self, override_path: Option<&Path>) -> PathBuf;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvStorePathResolver;

impl StorePathResolver for EnvStorePathResolver {
    fn resolve(&self, override_path: Option<&Path>) -> PathBuf {
        if let Some(path) = override_path {
            path.to_path_buf()
        } else if let Ok(env_value) = env::var(STORE_PATH_ENV) {
            PathBuf::from(env_value)
        } else {
            PathBuf::from(DEFAULT_STORE_PATH)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    encoding: String,
    records: Vec<StoredRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    name: String,
    dimension: usize,
    embedding: Embedding,
    enrolled_at: String,
}

impl From<&IdentityRecord> for StoredRecord {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            name: record.name.clone(),
            dimension: record.embedding.len(),
            embedding: record.embedding.clone(),
            enrolled_at: record.enrolled_at.clone(),
        }
    }
}

/// Stores every identity in a single JSON document that is rewritten atomically.
#[derive(Debug)]
pub struct FilesystemEmbeddingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilesystemEmbeddingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_records(&self) -> AppResult<Vec<StoredRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&self.path).map_err(|source| AppError::StoreRead {
            path: self.path.clone(),
            source,
        })?;
        let document: StoreDocument =
            serde_json::from_slice(&data).map_err(|err| AppError::InvalidStore {
                path: self.path.clone(),
                message: format!("invalid store contents: {err}"),
            })?;

        if document.version != STORE_VERSION {
            return Err(AppError::InvalidStore {
                path: self.path.clone(),
                message: format!("unsupported store version {}", document.version),
            });
        }
        if document.encoding != EMBEDDING_ENCODING {
            return Err(AppError::InvalidStore {
                path: self.path.clone(),
                message: format!("unsupported embedding encoding '{}'", document.encoding),
            });
        }
        for record in &document.records {
            if record.embedding.len() != record.dimension {
                return Err(AppError::InvalidStore {
                    path: self.path.clone(),
                    message: format!(
                        "record '{}' declares {} values but holds {}",
                        record.name,
                        record.dimension,
                        record.embedding.len()
                    ),
                });
            }
        }

        Ok(document.records)
    }

    fn write_records(&self, records: Vec<StoredRecord>) -> AppResult<()> {
        let document = StoreDocument {
            version: STORE_VERSION,
            encoding: EMBEDDING_ENCODING.to_string(),
            records,
        };
        let path = self.path.as_path();

        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AppError::StoreWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let parent = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent).map_err(|source| AppError::StoreWrite {
            path: path.to_path_buf(),
            source,
        })?;

        {
            let file = tmp.as_file_mut();
            {
                let mut writer = BufWriter::new(&mut *file);
                let serialized = serde_json::to_vec_pretty(&document)?;
                writer
                    .write_all(&serialized)
                    .map_err(|source| AppError::StoreWrite {
                        path: path.to_path_buf(),
                        source,
                    })?;
                writer
                    .write_all(b"\n")
                    .map_err(|source| AppError::StoreWrite {
                        path: path.to_path_buf(),
                        source,
                    })?;
                writer.flush().map_err(|source| AppError::StoreWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            file.sync_all().map_err(|source| AppError::StoreWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let file = tmp.persist(path).map_err(|err| AppError::StoreWrite {
            path: path.to_path_buf(),
            source: err.error,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file
                .metadata()
                .map_err(|source| AppError::StoreWrite {
                    path: path.to_path_buf(),
                    source,
                })?
                .permissions();
            perms.set_mode(0o600);
            file
                .set_permissions(perms)
                .map_err(|source| AppError::StoreWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }
}

impl PersistentStore for FilesystemEmbeddingStore {
    fn save(&self, record: &IdentityRecord) -> AppResult<()> {
        let _guard = self.write_lock.lock();
        let mut records = self.read_records()?;
        let replacement = StoredRecord::from(record);
        match records.iter_mut().find(|entry| entry.name == record.name) {
            Some(existing) => *existing = replacement,
            None => records.push(replacement),
        }
        self.write_records(records)?;
        debug!(path = %self.path.display(), identity = %record.name, "persisted identity");
        Ok(())
    }

    fn load_all(&self) -> AppResult<Vec<IdentityRecord>> {
        let records = self.read_records()?;
        debug!(path = %self.path.display(), count = records.len(), "loaded identities");
        Ok(records
            .into_iter()
            .map(|record| IdentityRecord {
                name: record.name,
                embedding: record.embedding,
                enrolled_at: record.enrolled_at,
            })
            .collect())
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<IdentityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<IdentityRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn save(&self, record: &IdentityRecord) -> AppResult<()> {
        let mut records = self.records.lock();
        match records.iter_mut().find(|entry| entry.name == record.name) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn load_all(&self) -> AppResult<Vec<IdentityRecord>> {
        Ok(self.records.lock().clone())
    }
}
