// Copyright (c) 2018-2025 The Botho Foundation

//! On-disk node configuration, following `botho::config`'s `Config` /
//! `NetworkConfig` shape: a `serde`+`toml` struct with `#[serde(default =
//! "...")]` field defaults, loaded from and saved to a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sp_types::ids::ChainId;
use sp_types::registry::RollupSpec;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    /// The static set of rollups this node coordinates for. Feeds the
    /// in-process `Registry` implementation (`sp-node::ports::StaticRegistry`).
    #[serde(default)]
    pub rollups: Vec<RollupConfig>,
    #[serde(default)]
    pub l1: L1Config,
    #[serde(default)]
    pub proof: ProofConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unix seconds of slot 0's start.
    #[serde(default = "default_genesis_time")]
    pub genesis_time_unix_secs: u64,

    #[serde(default = "default_slot_duration_ms")]
    pub slot_duration_ms: u64,

    /// Fraction of a slot elapsed before seal cutover, in `(0, 1)`.
    #[serde(default = "default_seal_cutover")]
    pub seal_cutover: f64,

    /// Directory for the WAL file and the file-backed store snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            genesis_time_unix_secs: default_genesis_time(),
            slot_duration_ms: default_slot_duration_ms(),
            seal_cutover: default_seal_cutover(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_genesis_time() -> u64 {
    0
}

fn default_slot_duration_ms() -> u64 {
    2_000
}

fn default_seal_cutover() -> f64 {
    2.0 / 3.0
}

fn default_data_dir() -> String {
    "./data".to_string()
}

/// One rollup participating in the network, as configured (spec.md §6
/// `Registry.GetActiveRollups`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Hex-encoded chain id (e.g. `"0x01"`).
    pub chain_id: String,
    pub display_name: String,
}

impl RollupConfig {
    pub fn to_spec(&self) -> Result<RollupSpec> {
        let bytes = hex::decode(self.chain_id.trim_start_matches("0x"))
            .with_context(|| format!("invalid chain_id hex: {}", self.chain_id))?;
        Ok(RollupSpec {
            chain_id: ChainId::new(bytes),
            display_name: self.display_name.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1Config {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Hex address of the deployed `DisputeGameFactory`.
    #[serde(default = "default_factory_address")]
    pub factory_address: String,

    /// Hex-encoded signer private key. Empty in dry-run mode.
    #[serde(default)]
    pub signer_key: String,

    #[serde(default)]
    pub event_start_block: u64,

    /// When true, publishes against the in-memory `MockL1Publisher` instead
    /// of a real `alloy` RPC client. Used for local runs without a
    /// configured L1 endpoint.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            factory_address: default_factory_address(),
            signer_key: String::new(),
            event_start_block: 0,
            dry_run: default_dry_run(),
        }
    }
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_factory_address() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

fn default_dry_run() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofConfig {
    /// When true, superblocks are routed through a proof pipeline instead of
    /// publishing immediately (spec.md §4.4 step 7).
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config to {}", path.display()))
    }

    pub fn rollup_specs(&self) -> Result<Vec<RollupSpec>> {
        self.rollups.iter().map(RollupConfig::to_spec).collect()
    }
}

/// Default config path: `~/.sp-node/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sp-node")
        .join("config.toml")
}
