//! Process setup: argument parsing, settings-file fallback, logging, runtime.

use clap::Parser;
use tracing::debug;

use crate::args::{Command, EnvFile, ToolArgs, expand_template};
use crate::error::{AppError, AppResult, ValidationError};
use crate::logger::init_logging;
use crate::output::set_no_color;
use crate::tools::{self, ToolContext};

pub fn run() -> AppResult<i32> {
    let args = ToolArgs::try_parse()?;
    init_logging(args.verbose);
    set_no_color(args.no_color || std::env::var_os("NO_COLOR").is_some());

    let env_file = EnvFile::load();
    let server = args
        .server
        .clone()
        .or_else(|| env_file.get("METRICQ_SERVER").map(expand_template))
        .ok_or(AppError::Validation(ValidationError::MissingServer))?;
    let token = args
        .token
        .clone()
        .or_else(|| env_file.get("METRICQ_TOKEN").map(expand_template))
        .unwrap_or_else(|| expand_template(args.command.default_token()));
    debug!(server = %server, token = %token, "resolved connection settings");

    let context = ToolContext { server, token };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(&context, &args.command))
}

async fn dispatch(context: &ToolContext, command: &Command) -> AppResult<i32> {
    let exit_code = match command {
        Command::Discover(args) => {
            tools::discover::run(context, args).await?;
            None
        }
        Command::Check(args) => {
            tools::check::run(context, args).await?;
            None
        }
        Command::Csv(args) => {
            tools::csv::run(context, args).await?;
            None
        }
        Command::Energy(args) => tools::energy::run(context, args).await?,
        Command::Inspect(args) => {
            tools::inspect::run(context, args).await?;
            None
        }
        Command::Summary(args) => tools::summary::run(context, args).await?,
        Command::Send(args) => {
            tools::send::run(context, args).await?;
            None
        }
        Command::Spy(args) => {
            tools::spy::run(context, args).await?;
            None
        }
        Command::Slurm(args) => {
            tools::slurm::run(context, args).await?;
            None
        }
    };
    // Wrappers around a companion command forward its exit code.
    Ok(exit_code.unwrap_or(0))
}
