use std::process::ExitCode;

use clap::Parser;
use slicegrid::{cli, logger};

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    let code = cli::run(args);
    if let Some(path) = logger::log_path() {
        slicegrid::log_info!("Session log at {}", path.display());
    }
    code
}
