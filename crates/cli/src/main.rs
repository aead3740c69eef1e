//! # MDA Engines CLI
//!
//! `mda-engines run | validate | info`
//!
//! `run` 在阻塞线程上驱动引擎，帧经分发器写入各 sink；Ctrl-C / SIGTERM
//! 触发协作式取消，收尾与 sink 排空照常进行。

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::Verbosity;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_acquisition, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // .env may supply MDA_ENGINES_* and RUST_LOG
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    observability::init_tracing(
        cli.log_format.into(),
        Verbosity::from_flags(cli.quiet, cli.verbose),
    )?;
    info!(version = env!("CARGO_PKG_VERSION"), "mda-engines starting");

    let result = match &cli.command {
        Commands::Run(args) => run_acquisition(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };
    if let Err(e) = &result {
        error!(error = format!("{e:#}"), "Command failed");
    }
    result
}
