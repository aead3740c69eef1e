//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use contracts::EngineKind;

/// MDA Engines - simulated and drift-correcting acquisition engines
#[derive(Parser, Debug)]
#[command(
    name = "mda-engines",
    author,
    version,
    about = "Simulated and drift-correcting multi-dimensional acquisition",
    long_about = "Runs a multi-dimensional acquisition (time, position, channel, z) against a\n\
                  simulated microscope core.\n\n\
                  The dev engine renders every frame from a particle scene. The drift engine\n\
                  offsets stage targets per position from a drift table before each move."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MDA_ENGINES_VERBOSE")]
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
        env = "MDA_ENGINES_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an acquisition
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "acquisition.toml",
        env = "MDA_ENGINES_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the engine selected in the configuration
    #[arg(long, value_enum, env = "MDA_ENGINES_ENGINE")]
    pub engine: Option<EngineArg>,

    /// Drift engine: use the demo camera instead of the scene generator
    #[arg(long)]
    pub no_simulator: bool,

    /// Override wall-clock pacing of min_start_time (0 = run as fast as possible)
    #[arg(long, env = "MDA_ENGINES_TIME_SCALE")]
    pub time_scale: Option<f64>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size between the engine and the dispatcher
    #[arg(long, default_value = "100", env = "MDA_ENGINES_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MDA_ENGINES_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "acquisition.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "acquisition.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every expanded event
    #[arg(long)]
    pub events: bool,
}

/// Engine selection on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineArg {
    /// Simulated images from the particle scene
    Dev,
    /// Drift-table stage correction
    Drift,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Dev => EngineKind::Dev,
            EngineArg::Drift => EngineKind::DriftCorrection,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
