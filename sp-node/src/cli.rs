// Copyright (c) 2018-2025 The Botho Foundation

//! Command-line surface, following `botho`'s `Cli` / `Commands` split
//! (`init`, `run`, `status`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sp-node")]
#[command(about = "Shared Publisher superblock construction coordinator", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.sp-node/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file to the config path, if one doesn't
    /// already exist.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },

    /// Run the coordinator until interrupted.
    Run,

    /// Print the current slot, phase and latest superblock.
    Status,
}
