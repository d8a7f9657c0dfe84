use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use faceauth_core::capture::{FrameSource, V4lFrameSource};
use faceauth_core::faces::{
    DlibEmbedder, Embedder, EmbeddingRepository, FilesystemEmbeddingStore, PersistentStore,
};
use faceauth_core::session::{
    AuthenticationSession, CancellationToken, SessionConfig, SessionReport,
};
use tracing::debug;

use crate::cli::{GlobalOptions, LoginArgs, OutputMode};
use crate::config::load_settings;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub args: LoginArgs,
    pub globals: GlobalOptions,
    pub mode: OutputMode,
}

pub fn run_login(request: &LoginRequest) -> AppResult<SessionReport> {
    let settings = load_settings(&request.globals)?;
    let store: Arc<dyn PersistentStore> =
        Arc::new(FilesystemEmbeddingStore::new(settings.store_path.clone()));
    let repo = EmbeddingRepository::load(store)?;
    if repo.is_empty() {
        return Err(AppError::NoEnrolledIdentities);
    }

    let embedder = DlibEmbedder::from_config(&settings.embedder_config(&request.args.models))?;
    let mut frames = V4lFrameSource::new(settings.capture_config(&request.args.capture));
    let token = CancellationToken::new();
    spawn_stdin_canceller(token.clone(), request.mode);

    authenticate(
        &repo,
        &mut frames,
        &embedder,
        settings.session_config(&request.args),
        token,
    )
}

/// Runs one session; refuses to start when nobody is enrolled.
pub fn authenticate<F, E>(
    repo: &EmbeddingRepository,
    frames: &mut F,
    embedder: &E,
    config: SessionConfig,
    token: CancellationToken,
) -> AppResult<SessionReport>
where
    F: FrameSource + ?Sized,
    E: Embedder + ?Sized,
{
    if repo.is_empty() {
        return Err(AppError::NoEnrolledIdentities);
    }
    let mut session = AuthenticationSession::new(config, token);
    session.run(repo, frames, embedder)
}

/// Cancels `token` when a line arrives on stdin. EOF leaves the session running.
fn spawn_stdin_canceller(token: CancellationToken, mode: OutputMode) {
    if mode == OutputMode::Human {
        eprintln!("Looking for an enrolled face; press Enter to cancel.");
    }
    let spawned = thread::Builder::new()
        .name("stdin-cancel".into())
        .spawn(move || {
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => debug!("stdin closed; cancellation by keypress unavailable"),
                Ok(_) => {
                    debug!("cancellation requested from stdin");
                    token.cancel();
                }
                Err(err) => debug!(error = %err, "stdin read failed"),
            }
        });
    if let Err(err) = spawned {
        debug!(error = %err, "failed to spawn stdin watcher");
    }
}
