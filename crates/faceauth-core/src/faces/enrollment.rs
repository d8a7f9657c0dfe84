use serde::Serialize;
use tracing::{debug, info};

use crate::errors::AppResult;
use crate::faces::embedding::Embedding;
use crate::faces::repository::EmbeddingRepository;
use crate::faces::similarity::ACCEPTANCE_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrollmentPolicy {
    /// A candidate scoring above this against another identity is a duplicate face.
    pub duplicate_threshold: f64,
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            duplicate_threshold: ACCEPTANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollmentOutcome {
    Accepted { name: String },
    DuplicateFace { existing_name: String, score: f64 },
    DuplicateName { name: String },
    EmptyName,
}

impl EnrollmentOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnrollmentOutcome::Accepted { .. })
    }
}

/// Registers `candidate` under `name` unless the face or the name is taken.
///
/// The face check runs before the name check so a face cannot be enrolled
/// under a second identity just because the requested name is free. Rejections
/// never touch the repository; `Err` is reserved for invalid embeddings and
/// store failures, which also leave it unchanged.
pub fn enroll(
    repo: &EmbeddingRepository,
    name: &str,
    candidate: Embedding,
    policy: &EnrollmentPolicy,
) -> AppResult<EnrollmentOutcome> {
    if name.trim().is_empty() {
        return Ok(EnrollmentOutcome::EmptyName);
    }

    let writer = repo.begin_write();
    let snapshot = writer.snapshot();

    if let Some(best) = snapshot.find_most_similar(&candidate) {
        debug!(identity = %best.name, score = best.score, "closest enrolled face");
        if best.score > policy.duplicate_threshold && best.name != name {
            info!(
                requested = name,
                existing = %best.name,
                score = best.score,
                "rejecting enrollment: face already registered"
            );
            return Ok(EnrollmentOutcome::DuplicateFace {
                existing_name: best.name,
                score: best.score,
            });
        }
    }

    if snapshot.contains(name) {
        info!(requested = name, "rejecting enrollment: name already taken");
        return Ok(EnrollmentOutcome::DuplicateName {
            name: name.to_string(),
        });
    }

    writer.upsert(name, candidate)?;
    info!(identity = name, "enrolled new identity");
    Ok(EnrollmentOutcome::Accepted {
        name: name.to_string(),
    })
}
