use std::error::Error;
use std::io::{self, Write};

use faceauth_core::faces::EnrollmentOutcome;
use faceauth_core::session::{SessionOutcome, SessionReport};
use serde_json::{json, Value};

use crate::cli::OutputMode;
use crate::enroll::EnrollReport;
use crate::errors::{AppError, AppResult};
use crate::list::ListOutcome;

pub fn render_enroll(report: &EnrollReport, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if verbose {
                tracing::info!("Face source: {}", report.source);
            }
            match &report.outcome {
                EnrollmentOutcome::Accepted { name } => {
                    println!("Enrolled {name} ({})", report.store_path.display());
                }
                EnrollmentOutcome::DuplicateFace {
                    existing_name,
                    score,
                } => {
                    println!(
                        "Enrollment rejected: this face is already enrolled as {existing_name} (similarity={score:.4})"
                    );
                }
                EnrollmentOutcome::DuplicateName { name } => {
                    println!("Enrollment rejected: the name {name} is already taken");
                }
                EnrollmentOutcome::EmptyName => {
                    println!("Enrollment rejected: a name is required");
                }
            }
        }
        OutputMode::Json => write_json(&enroll_json_payload(report)?)?,
    }
    Ok(())
}

fn enroll_json_payload(report: &EnrollReport) -> AppResult<Value> {
    let mut payload = serde_json::to_value(&report.outcome)?;
    if let Value::Object(map) = &mut payload {
        map.insert("source".into(), json!(report.source));
        map.insert(
            "store_path".into(),
            json!(report.store_path.display().to_string()),
        );
        map.insert("bounding_box".into(), json!(report.bounding_box));
    }
    Ok(payload)
}

pub fn render_login(report: &SessionReport, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if verbose {
                tracing::info!(
                    "Session {}: {} frame(s), {} face(s) in {:.1}s",
                    report.session_id,
                    report.frames_captured,
                    report.faces_detected,
                    report.elapsed.as_secs_f64()
                );
            }
            match &report.outcome {
                SessionOutcome::Matched { name, score } => {
                    println!("Welcome, {name} (similarity={score:.4})");
                }
                SessionOutcome::TimedOut => match report.best_score {
                    Some(best) => println!(
                        "Authentication timed out: no enrolled face matched (best similarity={best:.4})"
                    ),
                    None => println!("Authentication timed out: no face recognised"),
                },
                SessionOutcome::Cancelled => println!("Authentication cancelled"),
                SessionOutcome::Failed { reason } => {
                    println!("Authentication failed: {reason}");
                }
            }
        }
        OutputMode::Json => write_json(&serde_json::to_value(report)?)?,
    }
    Ok(())
}

pub fn render_list(outcome: &ListOutcome, mode: OutputMode, _verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if outcome.identities.is_empty() {
                println!("No identities enrolled ({})", outcome.store_path.display());
            }
            for identity in &outcome.identities {
                println!("{}\t{}", identity.name, identity.enrolled_at);
            }
        }
        OutputMode::Json => write_json(&serde_json::to_value(outcome)?)?,
    }
    Ok(())
}

fn write_json(payload: &Value) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "status": "error",
                "error": err.human_message(),
            });
            println!("{payload}");
        }
    }
}
