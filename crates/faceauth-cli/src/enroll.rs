use std::path::PathBuf;
use std::sync::Arc;

use faceauth_core::capture::{FrameSource, ImageFileSource, V4lFrameSource};
use faceauth_core::faces::{
    enroll, BoundingBox, DlibEmbedder, Embedder, EmbeddingRepository, EnrollmentOutcome,
    EnrollmentPolicy, FilesystemEmbeddingStore, PersistentStore,
};
use tracing::info;

use crate::cli::{EnrollArgs, GlobalOptions};
use crate::config::{load_settings, Settings};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollReport {
    pub outcome: EnrollmentOutcome,
    pub source: String,
    pub store_path: PathBuf,
    /// Absent when the request was rejected before any capture.
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone)]
pub struct EnrollRequest {
    pub args: EnrollArgs,
    pub globals: GlobalOptions,
}

pub fn run_enroll(request: &EnrollRequest) -> AppResult<EnrollReport> {
    let settings = load_settings(&request.globals)?;
    let store: Arc<dyn PersistentStore> =
        Arc::new(FilesystemEmbeddingStore::new(settings.store_path.clone()));
    let repo = EmbeddingRepository::load(store)?;

    let mut frames = frame_source(&request.args, &settings);
    let embedder = DlibEmbedder::from_config(&settings.embedder_config(&request.args.models))?;
    let mut report = enroll_from_source(
        &repo,
        &request.args.name,
        frames.as_mut(),
        &embedder,
        &settings.enrollment_policy(),
    )?;
    report.store_path = settings.store_path;
    Ok(report)
}

fn frame_source(args: &EnrollArgs, settings: &Settings) -> Box<dyn FrameSource> {
    match &args.image {
        Some(path) => Box::new(ImageFileSource::new(path.clone())),
        None => Box::new(V4lFrameSource::new(settings.capture_config(&args.capture))),
    }
}

/// Captures one frame, embeds its first face and runs the enrollment checks.
///
/// A frame without a face is an error; duplicate and empty-name rejections are
/// reported through the returned outcome.
pub fn enroll_from_source<F, E>(
    repo: &EmbeddingRepository,
    name: &str,
    frames: &mut F,
    embedder: &E,
    policy: &EnrollmentPolicy,
) -> AppResult<EnrollReport>
where
    F: FrameSource + ?Sized,
    E: Embedder + ?Sized,
{
    let source = frames.describe();
    if name.trim().is_empty() {
        return Ok(EnrollReport {
            outcome: EnrollmentOutcome::EmptyName,
            source,
            store_path: PathBuf::new(),
            bounding_box: None,
        });
    }

    let frame = frames.next_frame()?;
    let detection = embedder
        .extract(&frame)?
        .ok_or_else(|| AppError::NoFaceDetected {
            source_name: source.clone(),
        })?;
    info!(source = %source, "face captured for enrollment");

    let outcome = enroll(repo, name, detection.embedding, policy)?;
    Ok(EnrollReport {
        outcome,
        source,
        store_path: PathBuf::new(),
        bounding_box: Some(detection.bounding_box),
    })
}
