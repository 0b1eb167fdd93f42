// Copyright (c) 2018-2025 The Botho Foundation

//! [`SlotExecution`]: the coordinator's authoritative per-slot snapshot
//! (spec.md §3), and the slot state machine's [`Phase`] enum (spec.md §4.2).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ChainId, XtId};
use crate::l2_block::{L2Block, L2BlockRequest};
use crate::scp_instance::ScpInstance;
use crate::xt::QueuedXtRequest;

/// The slot state machine's phase: `Starting -> Free -> Locked -> Sealing ->
/// Starting`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Phase {
    /// No active slot yet.
    Starting,
    /// Accepting new SCP instances and votes.
    Free,
    /// Past the point where the coordinator chooses to stop starting new
    /// SCPs (optional optimization point ahead of seal cutover).
    Locked,
    /// Inclusion set is fixed; waiting for L2 blocks.
    Sealing,
}

/// The coordinator's authoritative per-slot snapshot (spec.md §3
/// `SlotExecution`). A deep clone is appended to history on every
/// significant state change and written to the WAL.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotExecution {
    /// The slot this execution belongs to.
    pub slot: u64,
    /// Current automaton phase.
    pub state: Phase,
    /// Unix millis this slot was started.
    pub start_time_ms: u64,
    /// The superblock number this slot will produce, if it succeeds.
    pub next_superblock_number: u64,
    /// Hash of the most recent non-rolled-back superblock at the time this
    /// slot began.
    pub last_superblock_hash: [u8; 32],
    /// Rollups considered active for this slot.
    pub active_rollups: Vec<ChainId>,
    /// L2 blocks received so far this slot, keyed by chain.
    pub received_l2_blocks: BTreeMap<ChainId, L2Block>,
    /// SCP instances started this slot, keyed by `XtId`.
    pub scp_instances: BTreeMap<XtId, ScpInstance>,
    /// Per-chain block requests outstanding for this slot.
    pub l2_block_requests: BTreeMap<ChainId, L2BlockRequest>,
    /// The inclusion set, fixed once `RequestSeal` runs. `None` before
    /// sealing begins.
    pub included_xts: Option<Vec<XtId>>,
    /// XTs dequeued and started as an SCP this slot; tracked so they can be
    /// requeued on slot failure or rollback.
    pub attempted_requests: Vec<QueuedXtRequest>,
}

impl SlotExecution {
    /// Install a fresh slot in `Starting` phase with one `L2BlockRequest` per
    /// active rollup (spec.md §4.2 `BeginSlot`).
    pub fn begin(
        slot: u64,
        start_time_ms: u64,
        next_superblock_number: u64,
        last_superblock_hash: [u8; 32],
        active_rollups: Vec<ChainId>,
        l2_block_requests: BTreeMap<ChainId, L2BlockRequest>,
    ) -> Self {
        Self {
            slot,
            state: Phase::Free,
            start_time_ms,
            next_superblock_number,
            last_superblock_hash,
            active_rollups,
            received_l2_blocks: BTreeMap::new(),
            scp_instances: BTreeMap::new(),
            l2_block_requests,
            included_xts: None,
            attempted_requests: Vec::new(),
        }
    }

    /// A fresh, empty execution in `Starting` phase, used before the first
    /// `BeginSlot` call and as the install target for rollback restarts.
    pub fn starting(
        slot: u64,
        next_superblock_number: u64,
        last_superblock_hash: [u8; 32],
    ) -> Self {
        Self {
            slot,
            state: Phase::Starting,
            start_time_ms: 0,
            next_superblock_number,
            last_superblock_hash,
            active_rollups: Vec::new(),
            received_l2_blocks: BTreeMap::new(),
            scp_instances: BTreeMap::new(),
            l2_block_requests: BTreeMap::new(),
            included_xts: None,
            attempted_requests: Vec::new(),
        }
    }

    /// True iff every active chain has submitted a valid block for this slot
    /// (spec.md §4.2 `CheckAllL2BlocksReceived`).
    pub fn all_l2_blocks_received(&self) -> bool {
        self.active_rollups
            .iter()
            .all(|chain| self.received_l2_blocks.contains_key(chain))
    }

    /// SCP instances still awaiting a decision.
    pub fn undecided_instances(&self) -> impl Iterator<Item = &ScpInstance> {
        self.scp_instances.values().filter(|i| i.is_pending())
    }

    /// `XtId`s of instances decided `true`.
    pub fn accepted_xt_ids(&self) -> Vec<XtId> {
        self.scp_instances
            .values()
            .filter(|i| i.decision == Some(true))
            .map(|i| i.xt_id)
            .collect()
    }
}
