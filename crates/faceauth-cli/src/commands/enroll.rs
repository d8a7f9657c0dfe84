use std::any::Any;
use std::process::ExitCode;

use crate::cli::{EnrollArgs, GlobalOptions, OutputMode};
use crate::commands::{enrollment_exit_code, CommandHandler};
use crate::enroll::{self, EnrollReport, EnrollRequest};
use crate::errors::AppResult;
use crate::output::render_enroll;

pub struct EnrollHandler {
    request: EnrollRequest,
    run: Box<dyn Fn(&EnrollRequest) -> AppResult<EnrollReport> + Send + Sync>,
    render: Box<dyn Fn(&EnrollReport, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl EnrollHandler {
    pub fn new(args: EnrollArgs, globals: GlobalOptions) -> Self {
        Self::with_dependencies(args, globals, enroll::run_enroll, render_enroll)
    }

    pub fn with_dependencies(
        args: EnrollArgs,
        globals: GlobalOptions,
        run: impl Fn(&EnrollRequest) -> AppResult<EnrollReport> + Send + Sync + 'static,
        render: impl Fn(&EnrollReport, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            request: EnrollRequest { args, globals },
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for EnrollHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let report = (self.run)(&self.request)?;
        (self.render)(&report, mode, verbose)?;
        Ok(enrollment_exit_code(&report.outcome))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
