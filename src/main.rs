use clap::Parser;
use pub_cli::infrastructure::{config, logger};
use pub_cli::Cli;
use std::io::IsTerminal;

/// pub: stream JSON lines from stdin into HTTP requests
///
/// Each non-blank line is decoded, the URL, transform and header expressions
/// are evaluated against it, and one request is sent. Bad lines are reported
/// and skipped; only a failure to read stdin stops the run.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);
    colored::control::set_override(std::io::stderr().is_terminal());

    let env = config::load_environment();

    if let Err(err) = cli.run(env).await {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
