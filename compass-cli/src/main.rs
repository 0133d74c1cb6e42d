//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use compass_cli::CliError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("COMPASS_LOG", "info")).init();
    match compass_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
