// Copyright (c) 2018-2025 The Botho Foundation

//! Infrastructure-port traits (spec.md §6 "Consumed").
//!
//! Everything in this module is a contract the coordinator depends on but
//! does not implement: networking transport, the WAL byte format, and the KV
//! stores behind `L2BlockStore` / `SuperblockStore` / `XTRequestQueue` are
//! explicitly out of scope per spec.md §1. `#[async_trait]` is used because
//! every implementation here does I/O; this mirrors the pack's async rollup
//! code (`astriaorg-astria`) using trait objects at exactly this kind of
//! externally-injected I/O boundary.
//!
//! Trait methods return `anyhow::Result` rather than a single shared error
//! enum: each concrete implementation (a KV store, an RPC client, a transport
//! layer) has its own error domain, and this is the trait-object boundary
//! where those get erased, following `botho::config`'s
//! `.map_err(|e| anyhow!(...))` convention at wiring seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::{ChainId, XtId};
use crate::l2_block::L2Block;
use crate::messages::Message;
use crate::registry::RollupSpec;
use crate::superblock::Superblock;
use crate::wal::WalEntry;
use crate::xt::QueuedXtRequest;

/// Maps wall-time to slot numbers and signals seal cutover (spec.md §4.1).
#[async_trait]
pub trait SlotManager: Send + Sync {
    /// `slot = floor((now - GenesisTime) / Duration)`, clamped to 0.
    fn get_current_slot(&self) -> u64;

    /// True iff the fraction of the current slot elapsed is past the
    /// configured seal cutover ratio.
    fn is_slot_seal_time(&self) -> bool;
}

/// Persists superblocks keyed by number.
#[async_trait]
pub trait SuperblockStore: Send + Sync {
    async fn store_superblock(&self, superblock: &Superblock) -> anyhow::Result<()>;

    async fn get_superblock(&self, number: u64) -> anyhow::Result<Option<Superblock>>;

    async fn get_latest_superblock(&self) -> anyhow::Result<Option<Superblock>>;
}

/// Persists L2 blocks keyed by `(chain_id, block_number)`.
#[async_trait]
pub trait L2BlockStore: Send + Sync {
    async fn store_l2_block(&self, block: &L2Block) -> anyhow::Result<()>;

    async fn get_latest_l2_block(&self, chain_id: &ChainId) -> anyhow::Result<Option<L2Block>>;
}

/// The shared cross-rollup transaction queue.
#[async_trait]
pub trait XtRequestQueue: Send + Sync {
    async fn enqueue(&self, request: QueuedXtRequest) -> anyhow::Result<()>;

    /// Look at, but do not remove, the head of the queue.
    async fn peek(&self) -> anyhow::Result<Option<QueuedXtRequest>>;

    /// Remove and return the head of the queue.
    async fn dequeue(&self) -> anyhow::Result<Option<QueuedXtRequest>>;

    /// Push a previously-attempted request back onto the queue for a future
    /// slot (used by slot-failure and rollback requeueing).
    async fn requeue_for_slot(&self, request: QueuedXtRequest) -> anyhow::Result<()>;

    /// Sweep and drop entries whose `expires_at_ms` is in the past.
    async fn remove_expired(&self, now_ms: u64) -> anyhow::Result<u64>;
}

/// Resolves the set of rollups currently participating in the network.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_active_rollups(&self) -> anyhow::Result<Vec<RollupSpec>>;
}

/// Append-only write-ahead log.
#[async_trait]
pub trait Wal: Send + Sync {
    async fn write_entry(&self, entry: WalEntry) -> anyhow::Result<()>;

    /// Replay entries in `sequence` order starting at `from` (inclusive).
    async fn read_entries(&self, from: u64) -> anyhow::Result<Vec<WalEntry>>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Peer broadcast transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast `message` to all peers except `exclude_id`, if given.
    async fn broadcast(&self, message: Message, exclude_id: Option<&str>) -> anyhow::Result<()>;
}

/// Decision state of one in-flight SCP instance, as read by
/// `ConsensusCoordinator::get_state`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DecisionState {
    Pending,
    Accepted,
    Rejected,
}

/// The XT consensus supervisor's public contract (spec.md §4.3, §6).
#[async_trait]
pub trait ConsensusCoordinator: Send + Sync {
    /// Start a new SCP instance for `request`, identified by `xt_id`.
    /// Fails with an `AlreadyActive`-shaped error if `xt_id` is already
    /// active for this slot.
    async fn start_transaction(
        &self,
        slot: u64,
        sequence_number: u64,
        request: QueuedXtRequest,
        xt_id: XtId,
        participating_chains: Vec<ChainId>,
    ) -> anyhow::Result<()>;

    /// Route an externally-observed vote to its instance.
    async fn handle_vote(&self, xt_id: XtId, chain_id: ChainId, vote: bool) -> anyhow::Result<()>;

    /// Current decision state of `xt_id`, if it is known to the supervisor.
    async fn get_state(&self, xt_id: XtId) -> anyhow::Result<Option<DecisionState>>;

    /// Force a decision on `xt_id` (used by the coordinator's force-abort
    /// path at seal cutover); idempotent on an already-decided instance.
    async fn process_scp_decision(&self, xt_id: XtId, decided: bool) -> anyhow::Result<()>;

    /// Stop all timers and best-effort finalize every active instance.
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Observed status of a tracked L1 transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum L1TransactionStatus {
    Pending,
    Included,
    Confirmed,
    Finalized,
    Failed,
}

/// Semantic payload of an observed superblock-related L1 event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum L1SuperblockEvent {
    /// The superblock was proposed/submitted on L1.
    Proposed { superblock_number: u64 },
    /// The superblock was invalidated by an L1 dispute resolution.
    RolledBack { superblock_number: u64 },
}

/// Outbound (publish) and inbound (event/receipt) L1 contract surface
/// (spec.md §4.5, §4.6).
#[async_trait]
pub trait L1Publisher: Send + Sync {
    /// Submit `superblock` with its proof bytes and aggregation outputs to
    /// the dispute-game factory. Returns the submitted transaction hash.
    async fn publish_superblock_with_proof(
        &self,
        superblock: &Superblock,
        proof: &[u8],
    ) -> anyhow::Result<[u8; 32]>;

    /// Poll the status of a previously-submitted transaction.
    async fn get_publish_status(&self, tx_hash: [u8; 32]) -> anyhow::Result<L1TransactionStatus>;

    /// Subscribe to superblock-related L1 events. Implementations typically
    /// spawn a background task and return a receiving end; here modeled as a
    /// pull: callers drain events with repeated calls until `None`.
    async fn watch_superblocks(&self) -> anyhow::Result<Vec<L1SuperblockEvent>>;

    /// The latest L1 block number observed.
    async fn get_latest_l1_block(&self) -> anyhow::Result<u64>;
}
