use std::any::Any;
use std::process::ExitCode;

use faceauth_core::faces::EnrollmentOutcome;
use faceauth_core::session::SessionOutcome;

use crate::cli::{Cli, Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod enroll;
mod list;
mod login;

pub use enroll::EnrollHandler;
pub use list::ListHandler;
pub use login::LoginHandler;

pub const EXIT_EMPTY_NAME: u8 = 5;
pub const EXIT_DUPLICATE_FACE: u8 = 6;
pub const EXIT_DUPLICATE_NAME: u8 = 7;
pub const EXIT_TIMED_OUT: u8 = 10;
pub const EXIT_CANCELLED: u8 = 11;
pub const EXIT_SESSION_FAILED: u8 = 12;

pub fn enrollment_exit_code(outcome: &EnrollmentOutcome) -> ExitCode {
    match outcome {
        EnrollmentOutcome::Accepted { .. } => ExitCode::SUCCESS,
        EnrollmentOutcome::EmptyName => ExitCode::from(EXIT_EMPTY_NAME),
        EnrollmentOutcome::DuplicateFace { .. } => ExitCode::from(EXIT_DUPLICATE_FACE),
        EnrollmentOutcome::DuplicateName { .. } => ExitCode::from(EXIT_DUPLICATE_NAME),
    }
}

pub fn session_exit_code(outcome: &SessionOutcome) -> ExitCode {
    match outcome {
        SessionOutcome::Matched { .. } => ExitCode::SUCCESS,
        SessionOutcome::TimedOut => ExitCode::from(EXIT_TIMED_OUT),
        SessionOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
        SessionOutcome::Failed { .. } => ExitCode::from(EXIT_SESSION_FAILED),
    }
}

impl From<Cli> for Box<dyn CommandHandler> {
    fn from(cli: Cli) -> Self {
        let globals = cli.global_options();
        let mode = cli.output_mode();
        match cli.command {
            Commands::Enroll(args) => Box::new(EnrollHandler::new(args, globals)),
            Commands::Login(args) => Box::new(LoginHandler::new(args, globals, mode)),
            Commands::List => Box::new(ListHandler::new(globals)),
        }
    }
}
