use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use faceauth_cli::cli::{CaptureArgs, GlobalOptions, LoginArgs, ModelArgs, OutputMode};
use faceauth_cli::commands::{
    CommandHandler, LoginHandler, EXIT_CANCELLED, EXIT_SESSION_FAILED, EXIT_TIMED_OUT,
};
use faceauth_cli::errors::AppError;
use faceauth_core::session::{SessionOutcome, SessionReport};

fn sample_args() -> LoginArgs {
    LoginArgs {
        timeout: Some(3),
        capture: CaptureArgs::default(),
        models: ModelArgs::default(),
    }
}

fn report(outcome: SessionOutcome) -> SessionReport {
    SessionReport {
        session_id: "7d3c2a1e".into(),
        outcome,
        frames_captured: 4,
        faces_detected: 2,
        best_score: Some(0.42),
        elapsed: Duration::from_millis(900),
    }
}

fn handler_for(outcome: SessionOutcome) -> LoginHandler {
    LoginHandler::with_dependencies(
        sample_args(),
        GlobalOptions::default(),
        OutputMode::Human,
        move |_request| Ok(report(outcome.clone())),
        |_report, _mode, _verbose| Ok(()),
    )
}

#[test]
fn matched_session_exits_successfully() {
    let handler = handler_for(SessionOutcome::Matched {
        name: "alice".into(),
        score: 0.88,
    });
    assert_eq!(
        handler.execute(OutputMode::Human, false).unwrap(),
        ExitCode::SUCCESS
    );
}

#[test]
fn non_match_outcomes_have_distinct_exit_codes() {
    let cases = [
        (SessionOutcome::TimedOut, EXIT_TIMED_OUT),
        (SessionOutcome::Cancelled, EXIT_CANCELLED),
        (
            SessionOutcome::Failed {
                reason: "camera unplugged".into(),
            },
            EXIT_SESSION_FAILED,
        ),
    ];
    for (outcome, code) in cases {
        let exit = handler_for(outcome).execute(OutputMode::Json, false).unwrap();
        assert_eq!(exit, ExitCode::from(code));
    }
}

#[test]
fn login_handler_forwards_request_fields() {
    let seen = Arc::new(Mutex::new(None));
    let handler = LoginHandler::with_dependencies(
        sample_args(),
        GlobalOptions {
            config: Some(PathBuf::from("/etc/faceauth/alt.toml")),
            store: None,
        },
        OutputMode::Json,
        {
            let seen = Arc::clone(&seen);
            move |request| {
                *seen.lock().unwrap() = Some((
                    request.args.timeout,
                    request.globals.config.clone(),
                    request.mode,
                ));
                Ok(report(SessionOutcome::TimedOut))
            }
        },
        |_report, _mode, _verbose| Ok(()),
    );

    handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some((
            Some(3),
            Some(PathBuf::from("/etc/faceauth/alt.toml")),
            OutputMode::Json
        ))
    );
}

#[test]
fn empty_repository_error_is_propagated() {
    let handler = LoginHandler::with_dependencies(
        sample_args(),
        GlobalOptions::default(),
        OutputMode::Human,
        |_request| Err(AppError::NoEnrolledIdentities),
        |_report, _mode, _verbose| panic!("render must not run on error"),
    );
    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert!(matches!(err, AppError::NoEnrolledIdentities));
}
