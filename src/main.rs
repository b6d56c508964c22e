use std::process::ExitCode;

use metricq_tools::{entry, error::AppError};

fn main() -> ExitCode {
    match entry::run() {
        Ok(code) => u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from),
        Err(AppError::Clap { source }) => {
            // Let clap render help/version/usage errors itself.
            source.exit()
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            ExitCode::FAILURE
        }
    }
}
