use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use faceauth_core::faces::{
    enroll, BoundingBox, Embedder, Embedding, EmbeddingRepository, EnrollmentOutcome,
    EnrollmentPolicy, FaceDetection, FilesystemEmbeddingStore, PersistentStore,
};
use faceauth_core::{
    AppError, AppResult, AuthenticationSession, CancellationToken, Frame, FrameSource,
    SessionConfig, SessionOutcome,
};
use tempfile::TempDir;

struct StillFrames;

impl FrameSource for StillFrames {
    fn next_frame(&mut self) -> AppResult<Frame> {
        Ok(Frame::new(2, 2))
    }
}

struct QueueEmbedder {
    queue: Mutex<VecDeque<Vec<f64>>>,
}

impl QueueEmbedder {
    fn new(items: Vec<Vec<f64>>) -> Self {
        Self {
            queue: Mutex::new(items.into()),
        }
    }
}

impl Embedder for QueueEmbedder {
    fn extract(&self, _frame: &Frame) -> AppResult<Option<FaceDetection>> {
        let next = self.queue.lock().unwrap().pop_front();
        Ok(next.map(|values| FaceDetection {
            embedding: Embedding::new(values),
            bounding_box: BoundingBox {
                left: 0,
                top: 0,
                right: 2,
                bottom: 2,
            },
        }))
    }
}

fn open_repo(tmp: &TempDir) -> EmbeddingRepository {
    let store: Arc<dyn PersistentStore> =
        Arc::new(FilesystemEmbeddingStore::new(tmp.path().join("embeddings.json")));
    EmbeddingRepository::load(store).unwrap()
}

#[test]
fn enrolled_identities_survive_restart_and_authenticate() {
    let tmp = TempDir::new().unwrap();
    let policy = EnrollmentPolicy::default();

    {
        let repo = open_repo(&tmp);
        assert!(enroll(&repo, "alice", Embedding::new(vec![1.0, 0.1, 0.0]), &policy)
            .unwrap()
            .is_accepted());
        assert!(enroll(&repo, "bob", Embedding::new(vec![0.0, 0.2, 1.0]), &policy)
            .unwrap()
            .is_accepted());
        assert!(matches!(
            enroll(&repo, "mallory", Embedding::new(vec![0.95, 0.1, 0.0]), &policy).unwrap(),
            EnrollmentOutcome::DuplicateFace { ref existing_name, .. } if existing_name == "alice"
        ));
    }

    let repo = open_repo(&tmp);
    assert_eq!(repo.snapshot().names(), vec!["alice", "bob"]);

    let embedder = QueueEmbedder::new(vec![vec![0.0, 0.25, 0.9]]);
    let mut session = AuthenticationSession::new(SessionConfig::default(), CancellationToken::new());
    let report = session.run(&repo, &mut StillFrames, &embedder).unwrap();
    match report.outcome {
        SessionOutcome::Matched { name, score } => {
            assert_eq!(name, "bob");
            assert!(score > 0.6);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn unknown_face_times_out_against_persisted_repository() {
    let tmp = TempDir::new().unwrap();
    let repo = open_repo(&tmp);
    enroll(
        &repo,
        "alice",
        Embedding::new(vec![1.0, 0.0, 0.0]),
        &EnrollmentPolicy::default(),
    )
    .unwrap();

    let embedder = QueueEmbedder::new(vec![vec![0.0, 0.0, 1.0]; 4]);
    let mut session = AuthenticationSession::new(
        SessionConfig {
            deadline: Duration::from_millis(80),
            frame_interval: Duration::from_millis(5),
            ..SessionConfig::default()
        },
        CancellationToken::new(),
    );
    let report = session.run(&repo, &mut StillFrames, &embedder).unwrap();
    assert_eq!(report.outcome, SessionOutcome::TimedOut);
    assert_eq!(report.best_score, Some(0.0));
}

#[test]
fn corrupt_store_is_reported_not_ignored() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("embeddings.json");
    fs::write(&path, b"{ not json").unwrap();

    let store: Arc<dyn PersistentStore> = Arc::new(FilesystemEmbeddingStore::new(&path));
    let err = EmbeddingRepository::load(store).err().unwrap();
    assert!(matches!(err, AppError::InvalidStore { .. }));
}
