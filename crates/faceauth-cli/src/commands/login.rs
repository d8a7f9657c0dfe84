use std::any::Any;
use std::process::ExitCode;

use faceauth_core::session::SessionReport;

use crate::cli::{GlobalOptions, LoginArgs, OutputMode};
use crate::commands::{session_exit_code, CommandHandler};
use crate::errors::AppResult;
use crate::login::{self, LoginRequest};
use crate::output::render_login;

pub struct LoginHandler {
    request: LoginRequest,
    run: Box<dyn Fn(&LoginRequest) -> AppResult<SessionReport> + Send + Sync>,
    render: Box<dyn Fn(&SessionReport, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl LoginHandler {
    pub fn new(args: LoginArgs, globals: GlobalOptions, mode: OutputMode) -> Self {
        Self::with_dependencies(args, globals, mode, login::run_login, render_login)
    }

    pub fn with_dependencies(
        args: LoginArgs,
        globals: GlobalOptions,
        mode: OutputMode,
        run: impl Fn(&LoginRequest) -> AppResult<SessionReport> + Send + Sync + 'static,
        render: impl Fn(&SessionReport, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            request: LoginRequest {
                args,
                globals,
                mode,
            },
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for LoginHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let report = (self.run)(&self.request)?;
        (self.render)(&report, mode, verbose)?;
        Ok(session_exit_code(&report.outcome))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
