use crossterm::style::Color;
use tracing::{debug, error, info};

use crate::error::{AppResult, ValidationError};
use crate::output::styled;

/// Runs the companion command with captured output, echoing stdout as-is and
/// stderr in red once the command exits.
///
/// # Errors
///
/// Returns an error when the command list is empty or the process cannot be
/// spawned. A non-zero exit status is reported, not an error.
pub async fn run_command(command: &[String]) -> AppResult<Option<i32>> {
    let (program, arguments) = command
        .split_first()
        .ok_or(ValidationError::MissingCommand)
        .map_err(crate::error::AppError::validation)?;

    debug!(?command, "running companion command");

    let output = tokio::process::Command::new(program)
        .args(arguments)
        .output()
        .await?;

    if !output.stdout.is_empty() {
        print!("{}", String::from_utf8_lossy(&output.stdout));
    }
    if !output.stderr.is_empty() {
        eprint!(
            "{}",
            styled(String::from_utf8_lossy(&output.stderr), Color::Red)
        );
    }

    match output.status.code() {
        Some(0) => info!(?command, "command exited with 0"),
        Some(code) => error!(?command, code, "command exited with non-zero status"),
        None => error!(?command, "command terminated by signal"),
    }

    Ok(output.status.code())
}
