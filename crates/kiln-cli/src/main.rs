//! kiln CLI entry point: argument parsing, logging initialization, and
//! command dispatch.

use clap::Parser;
use kiln_cli::{cli, commands, logger};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logger::init_logger(args.verbose, args.quiet);

    match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args).await,
    }
}
