use std::path::PathBuf;
use std::sync::Arc;

use faceauth_core::faces::{EmbeddingRepository, FilesystemEmbeddingStore, PersistentStore};
use serde::Serialize;

use crate::cli::GlobalOptions;
use crate::config::load_settings;
use crate::errors::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrolledIdentity {
    pub name: String,
    pub dimension: usize,
    pub enrolled_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListOutcome {
    pub store_path: PathBuf,
    pub identities: Vec<EnrolledIdentity>,
}

pub fn run_list(globals: &GlobalOptions) -> AppResult<ListOutcome> {
    let settings = load_settings(globals)?;
    let store: Arc<dyn PersistentStore> =
        Arc::new(FilesystemEmbeddingStore::new(settings.store_path.clone()));
    let repo = EmbeddingRepository::load(store)?;
    Ok(ListOutcome {
        store_path: settings.store_path,
        identities: list_identities(&repo),
    })
}

/// Enrolled identities in name order.
pub fn list_identities(repo: &EmbeddingRepository) -> Vec<EnrolledIdentity> {
    repo.snapshot()
        .iter()
        .map(|record| EnrolledIdentity {
            name: record.name.clone(),
            dimension: record.embedding.len(),
            enrolled_at: record.enrolled_at.clone(),
        })
        .collect()
}
