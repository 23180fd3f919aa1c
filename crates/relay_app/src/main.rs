mod args;
mod commands;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use engine_logging::engine_error;

use crate::args::Args;
use crate::logging::LogDestination;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let destination = if args.log_file {
        LogDestination::Both
    } else {
        LogDestination::Terminal
    };
    logging::initialize(destination, args.verbose);

    match commands::execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
