// Copyright (c) 2018-2025 The Botho Foundation

//! In-memory port implementations for integration tests (spec.md §8
//! scenarios S1-S6). Grounded on `botho/tests/network_integration.rs`'s
//! in-process test-double style (plain `Mutex`-backed state, no I/O).

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use sp_types::ids::ChainId;
use sp_types::l2_block::L2Block;
use sp_types::messages::Message;
use sp_types::ports::{L2BlockStore, Registry, SuperblockStore, Transport, Wal, XtRequestQueue};
use sp_types::registry::RollupSpec;
use sp_types::superblock::Superblock;
use sp_types::wal::WalEntry;
use sp_types::xt::QueuedXtRequest;

/// In-memory `SuperblockStore`, keyed by superblock number.
#[derive(Default)]
pub struct MemSuperblockStore {
    inner: Mutex<BTreeMap<u64, Superblock>>,
}

#[async_trait]
impl SuperblockStore for MemSuperblockStore {
    async fn store_superblock(&self, superblock: &Superblock) -> anyhow::Result<()> {
        self.inner.lock().insert(superblock.number, superblock.clone());
        Ok(())
    }

    async fn get_superblock(&self, number: u64) -> anyhow::Result<Option<Superblock>> {
        Ok(self.inner.lock().get(&number).cloned())
    }

    async fn get_latest_superblock(&self) -> anyhow::Result<Option<Superblock>> {
        Ok(self.inner.lock().values().next_back().cloned())
    }
}

/// In-memory `L2BlockStore`, keyed by `(chain_id, block_number)`.
#[derive(Default)]
pub struct MemL2BlockStore {
    inner: Mutex<BTreeMap<(ChainId, u64), L2Block>>,
}

#[async_trait]
impl L2BlockStore for MemL2BlockStore {
    async fn store_l2_block(&self, block: &L2Block) -> anyhow::Result<()> {
        self.inner
            .lock()
            .insert((block.chain_id.clone(), block.block_number), block.clone());
        Ok(())
    }

    async fn get_latest_l2_block(&self, chain_id: &ChainId) -> anyhow::Result<Option<L2Block>> {
        Ok(self
            .inner
            .lock()
            .range((chain_id.clone(), 0)..(chain_id.clone(), u64::MAX))
            .next_back()
            .map(|(_, block)| block.clone()))
    }
}

/// In-memory FIFO `XtRequestQueue`.
#[derive(Default)]
pub struct MemXtRequestQueue {
    inner: Mutex<VecDeque<QueuedXtRequest>>,
}

#[async_trait]
impl XtRequestQueue for MemXtRequestQueue {
    async fn enqueue(&self, request: QueuedXtRequest) -> anyhow::Result<()> {
        self.inner.lock().push_back(request);
        Ok(())
    }

    async fn peek(&self) -> anyhow::Result<Option<QueuedXtRequest>> {
        Ok(self.inner.lock().front().cloned())
    }

    async fn dequeue(&self) -> anyhow::Result<Option<QueuedXtRequest>> {
        Ok(self.inner.lock().pop_front())
    }

    async fn requeue_for_slot(&self, request: QueuedXtRequest) -> anyhow::Result<()> {
        self.inner.lock().push_front(request);
        Ok(())
    }

    async fn remove_expired(&self, now_ms: u64) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|q| !q.is_expired(now_ms));
        Ok((before - inner.len()) as u64)
    }
}

/// Static in-memory `Registry`.
pub struct MemRegistry {
    rollups: Vec<RollupSpec>,
}

impl MemRegistry {
    pub fn new(rollups: Vec<RollupSpec>) -> Self {
        Self { rollups }
    }
}

#[async_trait]
impl Registry for MemRegistry {
    async fn get_active_rollups(&self) -> anyhow::Result<Vec<RollupSpec>> {
        Ok(self.rollups.clone())
    }
}

/// In-memory `Wal` that only ever appends to a `Vec`, for tests that don't
/// care about crash-recovery across process restarts.
#[derive(Default)]
pub struct MemWal {
    entries: Mutex<Vec<WalEntry>>,
    next_sequence: Mutex<u64>,
}

#[async_trait]
impl Wal for MemWal {
    async fn write_entry(&self, mut entry: WalEntry) -> anyhow::Result<()> {
        let mut next = self.next_sequence.lock();
        entry.sequence = *next;
        *next += 1;
        self.entries.lock().push(entry);
        Ok(())
    }

    async fn read_entries(&self, from: u64) -> anyhow::Result<Vec<WalEntry>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.sequence >= from)
            .cloned()
            .collect())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// `Transport` backed by a `tokio::sync::broadcast` channel; every broadcast
/// message is both kept for assertions and published on the channel, which
/// is how the network-facing half of a real transport would re-emit it.
pub struct MemTransport {
    sent: Mutex<Vec<Message>>,
    tx: broadcast::Sender<Message>,
}

impl MemTransport {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            sent: Mutex::new(Vec::new()),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

impl Default for MemTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemTransport {
    async fn broadcast(&self, message: Message, _exclude_id: Option<&str>) -> anyhow::Result<()> {
        self.sent.lock().push(message.clone());
        // No subscribers is a normal idle-test condition, not an error.
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub fn rollup(chain: u8, name: &str) -> RollupSpec {
    RollupSpec {
        chain_id: ChainId::new(vec![chain]),
        display_name: name.to_string(),
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
