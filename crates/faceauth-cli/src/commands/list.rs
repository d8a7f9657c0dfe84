use std::any::Any;
use std::process::ExitCode;

use crate::cli::{GlobalOptions, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::list::{self, ListOutcome};
use crate::output::render_list;

pub struct ListHandler {
    globals: GlobalOptions,
    run: Box<dyn Fn(&GlobalOptions) -> AppResult<ListOutcome> + Send + Sync>,
    render: Box<dyn Fn(&ListOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl ListHandler {
    pub fn new(globals: GlobalOptions) -> Self {
        Self::with_dependencies(globals, list::run_list, render_list)
    }

    pub fn with_dependencies(
        globals: GlobalOptions,
        run: impl Fn(&GlobalOptions) -> AppResult<ListOutcome> + Send + Sync + 'static,
        render: impl Fn(&ListOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            globals,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for ListHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.globals)?;
        (self.render)(&outcome, mode, verbose)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
