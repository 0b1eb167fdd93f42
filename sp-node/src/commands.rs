// Copyright (c) 2018-2025 The Botho Foundation

//! CLI command implementations, following `botho::commands`'s one-module-
//! per-command layout.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;

use sp_coordinator::{Coordinator, CoordinatorConfig, CoordinatorDeps};
use sp_l1_bridge::{testing::MockL1Publisher, AlloyL1Publisher, L1BridgeConfig};
use sp_proof_pipeline::{CallbackProofPipeline, NullProofPipeline, ProofPipeline};
use sp_slot_clock::{genesis_time_from_unix_secs, SystemSlotClock};
use sp_wal::FileWal;

use crate::config::{default_config_path, Config};
use crate::ports::{shared, FileL2BlockStore, FileSuperblockStore, FileXtRequestQueue, LoggingTransport, StaticRegistry};

pub fn init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = config_path.unwrap_or_else(default_config_path);
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Config {
        node: Default::default(),
        rollups: Vec::new(),
        l1: Default::default(),
        proof: Default::default(),
    }
    .save(&path)?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = config_path.unwrap_or_else(default_config_path);
    let config = Config::load(&path).context("config not found; run 'sp-node init' first")?;
    Ok((config, path))
}

/// Builds the proof pipeline up front. `Coordinator::new` takes it by value,
/// but the accepting-proof callback needs to call back into the coordinator
/// it belongs to, which doesn't exist yet; `coordinator_cell` bridges that,
/// filled in immediately after `Coordinator::new` returns.
fn build_proof_pipeline(
    coordinator_cell: Arc<tokio::sync::OnceCell<Arc<Coordinator>>>,
    config: &Config,
) -> Arc<dyn ProofPipeline> {
    if !config.proof.enabled {
        return Arc::new(NullProofPipeline);
    }
    Arc::new(CallbackProofPipeline::new(Arc::new(move |superblock, proof| {
        let coordinator_cell = coordinator_cell.clone();
        Box::pin(async move {
            let Some(coordinator) = coordinator_cell.get() else {
                tracing::error!("proof callback fired before coordinator was initialized");
                return;
            };
            if let Err(e) = coordinator.publish_superblock(superblock, &proof).await {
                tracing::error!(error = %e, "failed to publish proven superblock");
            }
        })
    })))
}

/// Run the coordinator until interrupted with Ctrl-C.
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let data_dir = PathBuf::from(&config.node.data_dir);

    let slot_manager = shared(SystemSlotClock::new(
        genesis_time_from_unix_secs(config.node.genesis_time_unix_secs),
        Duration::from_millis(config.node.slot_duration_ms),
        config.node.seal_cutover,
    )?);

    let superblock_store = shared(FileSuperblockStore::open(data_dir.join("superblocks.json")).await?);
    let l2_block_store = shared(FileL2BlockStore::open(data_dir.join("l2_blocks.json")).await?);
    let queue = shared(FileXtRequestQueue::open(data_dir.join("xt_queue.json")).await?);
    let registry = shared(StaticRegistry::new(config.rollup_specs()?));
    let wal = shared(FileWal::open(data_dir.join("wal.log"))?);
    let transport = shared(LoggingTransport);

    let l1: Arc<dyn sp_types::ports::L1Publisher> = if config.l1.dry_run {
        info!("L1 bridge running in dry-run mode against an in-memory publisher");
        shared(MockL1Publisher::default())
    } else {
        let bridge_config = L1BridgeConfig {
            rpc_url: config.l1.rpc_url.clone(),
            factory_address: alloy::primitives::Address::from_str(&config.l1.factory_address)
                .context("invalid L1 factory address")?,
            signer_key: config.l1.signer_key.clone(),
            event_start_block: config.l1.event_start_block,
        };
        shared(AlloyL1Publisher::connect(&bridge_config).await?)
    };

    sp_metrics::init();

    let coordinator_cell: Arc<tokio::sync::OnceCell<Arc<Coordinator>>> =
        Arc::new(tokio::sync::OnceCell::new());
    let proof_pipeline = build_proof_pipeline(coordinator_cell.clone(), &config);
    if config.proof.enabled {
        info!("proof pipeline enabled: superblocks await an external proof callback before publish");
    }

    let deps = CoordinatorDeps {
        slot_manager,
        superblock_store,
        l2_block_store,
        queue,
        registry,
        wal,
        transport,
        l1,
        proof_pipeline,
    };
    let coordinator = Coordinator::new(deps, CoordinatorConfig::default());
    coordinator_cell
        .set(coordinator.clone())
        .unwrap_or_else(|_| unreachable!("cell is only set once, here"));

    coordinator.recover().await.context("recovery from WAL failed")?;

    let run_handle = tokio::spawn(coordinator.clone().run());

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    coordinator.stop().await?;
    run_handle.abort();

    Ok(())
}

pub async fn status(config_path: Option<PathBuf>) -> Result<()> {
    let (config, path) = load_config(config_path)?;
    let data_dir = PathBuf::from(&config.node.data_dir);

    let slot_manager = SystemSlotClock::new(
        genesis_time_from_unix_secs(config.node.genesis_time_unix_secs),
        Duration::from_millis(config.node.slot_duration_ms),
        config.node.seal_cutover,
    )?;
    let superblock_store = FileSuperblockStore::open(data_dir.join("superblocks.json")).await?;

    use sp_types::ports::{SlotManager, SuperblockStore};
    let latest = superblock_store.get_latest_superblock().await?;

    println!();
    println!("=== sp-node status ===");
    println!("config: {}", path.display());
    println!();
    println!("slot: {}", slot_manager.get_current_slot());
    println!("seal time: {}", slot_manager.is_slot_seal_time());
    println!("rollups: {}", config.rollups.len());
    println!();
    match latest {
        Some(sb) => {
            println!("latest superblock:");
            println!("  number: {}", sb.number);
            println!("  slot: {}", sb.slot);
            println!("  hash: {}", hex::encode(sb.hash));
            println!("  status: {:?}", sb.status);
        }
        None => println!("latest superblock: (none)"),
    }
    Ok(())
}
