// Copyright (c) 2018-2025 The Botho Foundation

//! In-process implementations of `sp_types::ports` for the standalone
//! binary. spec.md §1 places the KV stores, the registry and the transport
//! layer out of scope as external collaborators; a runnable node still needs
//! *something* behind those traits, so these are simple JSON-file- and
//! memory-backed stand-ins, not meant to scale past a single node.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, warn};

use sp_types::ids::ChainId;
use sp_types::l2_block::L2Block;
use sp_types::messages::Message;
use sp_types::ports::{L2BlockStore, Registry, SuperblockStore, Transport, XtRequestQueue};
use sp_types::registry::RollupSpec;
use sp_types::superblock::Superblock;
use sp_types::xt::QueuedXtRequest;

/// Reads the whole file into `T`, or `default` if it does not exist yet.
async fn read_json_or<T: serde::de::DeserializeOwned>(path: &Path, default: T) -> anyhow::Result<T> {
    match fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(value)?;
    fs::write(path, bytes).await?;
    Ok(())
}

/// Superblock store backed by one JSON file holding the full map.
///
/// A single internal `Mutex` serializes reads and writes; fine for a node
/// that only ever appends one superblock per slot.
pub struct FileSuperblockStore {
    path: PathBuf,
    cache: Mutex<HashMap<u64, Superblock>>,
}

impl FileSuperblockStore {
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let loaded: Vec<Superblock> = read_json_or(&path, Vec::new()).await?;
        let cache = loaded.into_iter().map(|sb| (sb.number, sb)).collect();
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut values: Vec<Superblock> = self.cache.lock().values().cloned().collect();
        values.sort_by_key(|sb| sb.number);
        write_json(&self.path, &values).await
    }
}

#[async_trait]
impl SuperblockStore for FileSuperblockStore {
    async fn store_superblock(&self, superblock: &Superblock) -> anyhow::Result<()> {
        self.cache.lock().insert(superblock.number, superblock.clone());
        self.flush().await
    }

    async fn get_superblock(&self, number: u64) -> anyhow::Result<Option<Superblock>> {
        Ok(self.cache.lock().get(&number).cloned())
    }

    async fn get_latest_superblock(&self) -> anyhow::Result<Option<Superblock>> {
        Ok(self.cache.lock().values().max_by_key(|sb| sb.number).cloned())
    }
}

/// L2 block store backed by one JSON file holding the full map, keyed by
/// `(chain_id, block_number)`, with an additional index tracking each
/// chain's latest block.
pub struct FileL2BlockStore {
    path: PathBuf,
    cache: Mutex<HashMap<(ChainId, u64), L2Block>>,
}

impl FileL2BlockStore {
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let loaded: Vec<L2Block> = read_json_or(&path, Vec::new()).await?;
        let cache = loaded
            .into_iter()
            .map(|b| ((b.chain_id.clone(), b.block_number), b))
            .collect();
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let values: Vec<L2Block> = self.cache.lock().values().cloned().collect();
        write_json(&self.path, &values).await
    }
}

#[async_trait]
impl L2BlockStore for FileL2BlockStore {
    async fn store_l2_block(&self, block: &L2Block) -> anyhow::Result<()> {
        self.cache
            .lock()
            .insert((block.chain_id.clone(), block.block_number), block.clone());
        self.flush().await
    }

    async fn get_latest_l2_block(&self, chain_id: &ChainId) -> anyhow::Result<Option<L2Block>> {
        Ok(self
            .cache
            .lock()
            .values()
            .filter(|b| &b.chain_id == chain_id)
            .max_by_key(|b| b.block_number)
            .cloned())
    }
}

/// FIFO cross-rollup transaction queue backed by one JSON file.
pub struct FileXtRequestQueue {
    path: PathBuf,
    queue: Mutex<std::collections::VecDeque<QueuedXtRequest>>,
}

impl FileXtRequestQueue {
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let loaded: Vec<QueuedXtRequest> = read_json_or(&path, Vec::new()).await?;
        Ok(Self {
            path,
            queue: Mutex::new(loaded.into()),
        })
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let values: Vec<QueuedXtRequest> = self.queue.lock().iter().cloned().collect();
        write_json(&self.path, &values).await
    }
}

#[async_trait]
impl XtRequestQueue for FileXtRequestQueue {
    async fn enqueue(&self, request: QueuedXtRequest) -> anyhow::Result<()> {
        self.queue.lock().push_back(request);
        self.flush().await
    }

    async fn peek(&self) -> anyhow::Result<Option<QueuedXtRequest>> {
        Ok(self.queue.lock().front().cloned())
    }

    async fn dequeue(&self) -> anyhow::Result<Option<QueuedXtRequest>> {
        let popped = self.queue.lock().pop_front();
        if popped.is_some() {
            self.flush().await?;
        }
        Ok(popped)
    }

    async fn requeue_for_slot(&self, request: QueuedXtRequest) -> anyhow::Result<()> {
        self.queue.lock().push_front(request);
        self.flush().await
    }

    async fn remove_expired(&self, now_ms: u64) -> anyhow::Result<u64> {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|r| !r.is_expired(now_ms));
        let removed = (before - queue.len()) as u64;
        drop(queue);
        if removed > 0 {
            self.flush().await?;
        }
        Ok(removed)
    }
}

/// Static rollup registry, populated once from configuration at startup.
pub struct StaticRegistry {
    rollups: Vec<RollupSpec>,
}

impl StaticRegistry {
    pub fn new(rollups: Vec<RollupSpec>) -> Self {
        Self { rollups }
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn get_active_rollups(&self) -> anyhow::Result<Vec<RollupSpec>> {
        Ok(self.rollups.clone())
    }
}

/// Transport that logs every broadcast instead of sending it over the wire.
/// The peer gossip layer is out of scope (spec.md §1); this keeps the
/// coordinator's broadcast calls meaningful for a single-node run.
#[derive(Default)]
pub struct LoggingTransport;

#[async_trait]
impl Transport for LoggingTransport {
    async fn broadcast(&self, message: Message, exclude_id: Option<&str>) -> anyhow::Result<()> {
        if let Some(id) = exclude_id {
            debug!(?message, excluding = id, "broadcast");
        } else {
            debug!(?message, "broadcast");
        }
        if matches!(message, Message::RollBackAndStartSlot { .. }) {
            warn!("rollback broadcast on a single-node transport has no remote peers to notify");
        }
        Ok(())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
