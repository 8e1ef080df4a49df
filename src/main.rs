use std::process::ExitCode;

use clap::Parser;
use liveryfe::{cli, logger};

fn main() -> ExitCode {
    let _ = logger::init();
    let args = cli::CliArgs::parse();
    let code = cli::run(args);
    logger::write_line("=== session ended ===");
    code
}
