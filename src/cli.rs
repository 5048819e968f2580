//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use uploadcare_dump::DEFAULT_CONCURRENCY;

/// Dump an Uploadcare project's file catalog and file contents to local disk.
///
/// Each configured project gets its own directory containing `meta.ndjson`
/// and a tree of downloaded files mirroring the objects' URL paths.
#[derive(Parser, Debug)]
#[command(name = "uploadcare-dump")]
#[command(author, version, about)]
pub struct Args {
    /// What to dump; defaults to `all`
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Provide path to custom config
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output root directory; one subdirectory is created per project
    #[arg(short, long, global = true, default_value = ".")]
    pub output: PathBuf,

    /// Maximum concurrent file downloads (1-32); 1 downloads strictly one at a time
    #[arg(short = 'n', long, global = true, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: u8,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Subcommands, mirroring the dump's two phases.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Dump metadata about files
    Meta,
    /// Use meta.ndjson to dump files
    Files,
    /// Dump metadata and files
    All,
    /// Check the config file is valid and the credentials work
    Conf,
}
