// Copyright (c) 2018-2025 The Botho Foundation

//! `sp-node`: the Shared Publisher superblock construction coordinator
//! binary. Parses the CLI, loads configuration, wires the infrastructure
//! ports and runs (or inspects) the coordinator.

mod cli;
mod commands;
mod config;
mod ports;
mod telemetry;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { force } => commands::init(cli.config, force),
        Commands::Run => commands::run(cli.config).await,
        Commands::Status => commands::status(cli.config).await,
    }
}
