//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// imagesync - drive the image synchronization engine from the shell
#[derive(Parser, Debug)]
#[command(
    name = "imagesync",
    author,
    version,
    about = "Deduplicating image synchronization engine",
    long_about = "Resolves images through worker pools and plugin channels, merging \n\
                  concurrent requests for the same image into one resolution."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "IMAGESYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "IMAGESYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize image files through the loader
    Load(LoadArgs),

    /// Apply the embedded-prefix transform to a file
    Decode(DecodeArgs),

    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `load` command
#[derive(Parser, Debug, Clone)]
pub struct LoadArgs {
    /// Image files to synchronize
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "IMAGESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Concurrent requests issued per file
    #[arg(long, default_value = "3", env = "IMAGESYNC_REPEAT")]
    pub repeat: usize,

    /// Override loader.worker_threads from configuration
    #[arg(long, env = "IMAGESYNC_WORKERS")]
    pub workers: Option<usize>,

    /// Seconds to wait for every callback (0 = no timeout)
    #[arg(long, default_value = "30", env = "IMAGESYNC_TIMEOUT")]
    pub timeout: u64,

    /// Fail unless every file ends up synchronized
    #[arg(long)]
    pub expect_all: bool,

    /// Metrics server port (overrides configuration)
    #[arg(long, env = "IMAGESYNC_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `decode` command
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Resource uid the key is derived from
    #[arg(long)]
    pub uid: String,

    /// Input file
    pub input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "imagesync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "imagesync.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
