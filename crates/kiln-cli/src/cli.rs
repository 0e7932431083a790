//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "kiln", version, about = "Multi-variant build pipeline for web projects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only show errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build every configured variant
    Build(BuildArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory the variant output trees are written under
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,

    /// Build only the named variant
    #[arg(long)]
    pub name: Option<String>,
}
