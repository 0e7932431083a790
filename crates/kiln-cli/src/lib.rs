//! kiln CLI - multi-variant build pipeline for web projects.
//!
//! This crate provides the command-line interface over `kiln-build`:
//! argument parsing, logging setup, and command dispatch.

pub mod cli;
pub mod commands;
pub mod logger;
