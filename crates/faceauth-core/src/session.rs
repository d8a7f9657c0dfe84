use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Serialize, Serializer};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::capture::FrameSource;
use crate::errors::{AppError, AppResult};
use crate::faces::embedding::Embedding;
use crate::faces::extractor::Embedder;
use crate::faces::repository::{EmbeddingRepository, Snapshot};
use crate::faces::similarity::ACCEPTANCE_THRESHOLD;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(20);

/// Cloneable cancel handle shared between a running session and its caller.
///
/// Cancelling also wakes any pause the session is sleeping through.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps up to `timeout`; returns `true` if cancelled before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let mut guard = self.inner.lock.lock();
        match Instant::now().checked_add(timeout) {
            Some(until) => {
                while !self.is_cancelled() {
                    if self.inner.signal.wait_until(&mut guard, until).timed_out() {
                        break;
                    }
                }
            }
            // Past the clock's range: only a cancel ends the wait.
            None => {
                while !self.is_cancelled() {
                    self.inner.signal.wait(&mut guard);
                }
            }
        }
        self.is_cancelled()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Matched,
    TimedOut,
    Cancelled,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Matched => "matched",
            SessionState::TimedOut => "timed_out",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Matched { name: String, score: f64 },
    TimedOut,
    Cancelled,
    Failed { reason: String },
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            SessionOutcome::Matched { .. } => SessionState::Matched,
            SessionOutcome::TimedOut => SessionState::TimedOut,
            SessionOutcome::Cancelled => SessionState::Cancelled,
            SessionOutcome::Failed { .. } => SessionState::Failed,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, SessionOutcome::Matched { .. })
    }
}

/// When the session reads the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotPolicy {
    /// One snapshot for the whole run.
    #[default]
    AtStart,
    /// Re-read before scoring every detected face, so mid-session enrollments count.
    EveryFrame,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub deadline: Duration,
    pub threshold: f64,
    /// Pause between frames; zero pulls the next frame immediately.
    pub frame_interval: Duration,
    pub snapshot_policy: SnapshotPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            threshold: ACCEPTANCE_THRESHOLD,
            frame_interval: Duration::ZERO,
            snapshot_policy: SnapshotPolicy::AtStart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    #[serde(flatten)]
    pub outcome: SessionOutcome,
    pub frames_captured: usize,
    pub faces_detected: usize,
    pub best_score: Option<f64>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// A single, bounded attempt to recognise an enrolled face.
///
/// The session reads from the repository but never writes to it. It runs at
/// most once; once terminal, further calls to [`AuthenticationSession::run`]
/// fail with [`AppError::SessionFinished`].
pub struct AuthenticationSession {
    id: String,
    config: SessionConfig,
    token: CancellationToken,
    state: SessionState,
}

impl AuthenticationSession {
    pub fn new(config: SessionConfig, token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            token,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn run<F, E>(
        &mut self,
        repo: &EmbeddingRepository,
        frames: &mut F,
        embedder: &E,
    ) -> AppResult<SessionReport>
    where
        F: FrameSource + ?Sized,
        E: Embedder + ?Sized,
    {
        if self.state != SessionState::Idle {
            return Err(AppError::SessionFinished {
                state: self.state.to_string(),
            });
        }

        let span = info_span!("auth_session", session_id = %self.id);
        let _entered = span.enter();

        self.state = SessionState::Running;
        let started = Instant::now();
        let mut snapshot = repo.snapshot();
        info!(
            candidates = snapshot.len(),
            deadline_ms = self.config.deadline.as_millis() as u64,
            threshold = self.config.threshold,
            source = %frames.describe(),
            "authentication session started"
        );

        let mut frames_captured = 0usize;
        let mut faces_detected = 0usize;
        let mut best_score: Option<f64> = None;

        let outcome = loop {
            if self.token.is_cancelled() {
                break SessionOutcome::Cancelled;
            }
            if started.elapsed() >= self.config.deadline {
                break SessionOutcome::TimedOut;
            }

            let frame = match frames.next_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "frame capture failed");
                    break SessionOutcome::Failed {
                        reason: err.to_string(),
                    };
                }
            };
            frames_captured += 1;

            let detection = match embedder.extract(&frame) {
                Ok(detection) => detection,
                Err(err) => {
                    warn!(error = %err, "embedding extraction failed");
                    break SessionOutcome::Failed {
                        reason: err.to_string(),
                    };
                }
            };

            if let Some(detection) = detection {
                faces_detected += 1;
                if self.config.snapshot_policy == SnapshotPolicy::EveryFrame {
                    snapshot = repo.snapshot();
                }
                if let Some(matched) = self.score(&snapshot, &detection.embedding, frames_captured)
                {
                    best_score = Some(best_score.map_or(matched.1, |best| best.max(matched.1)));
                    if matched.1 > self.config.threshold {
                        break SessionOutcome::Matched {
                            name: matched.0,
                            score: matched.1,
                        };
                    }
                }
            } else {
                debug!(frame = frames_captured, "no face in frame");
            }

            if !self.config.frame_interval.is_zero() {
                let remaining = self.config.deadline.saturating_sub(started.elapsed());
                self.token
                    .wait_timeout(self.config.frame_interval.min(remaining));
            }
        };

        self.state = outcome.state();
        let elapsed = started.elapsed();
        info!(
            state = %self.state,
            frames = frames_captured,
            faces = faces_detected,
            elapsed_ms = elapsed.as_millis() as u64,
            "authentication session finished"
        );

        Ok(SessionReport {
            session_id: self.id.clone(),
            outcome,
            frames_captured,
            faces_detected,
            best_score,
            elapsed,
        })
    }

    fn score(
        &self,
        snapshot: &Snapshot,
        candidate: &Embedding,
        frame: usize,
    ) -> Option<(String, f64)> {
        if let Some(expected) = snapshot.dimension() {
            if expected != candidate.len() {
                warn!(
                    expected,
                    found = candidate.len(),
                    "embedding dimensionality differs from repository; treating frame as no match"
                );
                return None;
            }
        }
        let best = snapshot.find_most_similar(candidate)?;
        debug!(frame, identity = %best.name, score = best.score, "best candidate for frame");
        Some((best.name, best.score))
    }
}
