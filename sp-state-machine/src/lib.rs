// Copyright (c) 2018-2025 The Botho Foundation

//! The slot state machine (spec.md §4.2): owns per-slot state
//! `{Starting, Free, Locked, Sealing}` and the transitions between them; the
//! authoritative in-memory model of an in-progress superblock.
//!
//! Internal locking is a single `std::sync::Mutex`-equivalent
//! (`parking_lot::Mutex`) around the mutable fields, per spec.md §5 ("the
//! state machine has its own internal locking"); the coordinator never holds
//! its own lock while calling in here.

pub mod error;

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::instrument;

use error::{StateMachineError, StateMachineResult};
use sp_types::ids::{ChainId, XtId};
use sp_types::l2_block::{L2Block, L2BlockRequest};
use sp_types::scp_instance::ScpInstance;
use sp_types::slot_execution::{Phase, SlotExecution};

/// A known chain head, used to derive the next slot's `L2BlockRequest`.
#[derive(Clone, Copy, Debug)]
struct ChainHead {
    block_number: u64,
    block_hash: [u8; 32],
}

struct Inner {
    execution: SlotExecution,
    last_heads: BTreeMap<ChainId, ChainHead>,
}

/// Owns one slot's authoritative state.
pub struct SlotStateMachine {
    inner: Mutex<Inner>,
}

impl SlotStateMachine {
    /// A fresh state machine, parked in `Starting` at slot 0 with no known
    /// chain heads.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                execution: SlotExecution::starting(0, 1, sp_types::hashing::ZERO_HASH),
                last_heads: BTreeMap::new(),
            }),
        }
    }

    /// Record a chain's last known head, consulted by the next `begin_slot`
    /// call for that chain.
    pub fn seed_last_head(&self, chain_id: ChainId, block_number: u64, block_hash: [u8; 32]) {
        self.inner.lock().last_heads.insert(
            chain_id,
            ChainHead {
                block_number,
                block_hash,
            },
        );
    }

    /// A read-only deep clone of the current execution (used for snapshots
    /// and WAL writes, outside any lock the caller holds).
    pub fn snapshot(&self) -> SlotExecution {
        self.inner.lock().execution.clone()
    }

    fn phase(&self) -> Phase {
        self.inner.lock().execution.state
    }

    /// Current phase, exposed for coordinator tick dispatch.
    pub fn current_phase(&self) -> Phase {
        self.phase()
    }

    /// Current slot number the state machine is tracking.
    pub fn current_slot(&self) -> u64 {
        self.inner.lock().execution.slot
    }

    /// `Starting -> Free`: install the new slot, derive one `L2BlockRequest`
    /// per active rollup from the cached last head for that chain (or
    /// `{0, None}` if none is known), and move to `Free`.
    #[instrument(skip(self, active_rollups))]
    pub fn begin_slot(
        &self,
        slot: u64,
        next_superblock_number: u64,
        last_superblock_hash: [u8; 32],
        active_rollups: Vec<ChainId>,
        start_time_ms: u64,
    ) -> StateMachineResult<()> {
        let mut guard = self.inner.lock();
        if guard.execution.state != Phase::Starting {
            return Err(StateMachineError::InvalidTransition(format!(
                "begin_slot called from {:?}",
                guard.execution.state
            )));
        }

        let requests = active_rollups
            .iter()
            .map(|chain_id| {
                let request = match guard.last_heads.get(chain_id) {
                    Some(head) => {
                        L2BlockRequest::from_head(chain_id.clone(), head.block_number, head.block_hash)
                    }
                    None => L2BlockRequest::genesis(chain_id.clone()),
                };
                (chain_id.clone(), request)
            })
            .collect();

        guard.execution = SlotExecution::begin(
            slot,
            start_time_ms,
            next_superblock_number,
            last_superblock_hash,
            active_rollups,
            requests,
        );
        Ok(())
    }

    /// `Free`: register a new SCP instance with a fresh sequence number.
    #[instrument(skip(self, request))]
    pub fn start_scp(
        &self,
        xt_id: XtId,
        request: sp_types::xt::XtRequest,
        participating_chains: Vec<ChainId>,
        start_time_ms: u64,
    ) -> StateMachineResult<ScpInstance> {
        let mut guard = self.inner.lock();
        if !matches!(guard.execution.state, Phase::Free | Phase::Locked) {
            return Err(StateMachineError::InvalidTransition(format!(
                "start_scp called from {:?}",
                guard.execution.state
            )));
        }
        if guard.execution.scp_instances.contains_key(&xt_id) {
            return Err(StateMachineError::AlreadyActive(guard.execution.slot));
        }

        let slot = guard.execution.slot;
        let sequence_number = guard.execution.scp_instances.len() as u64;
        let instance = ScpInstance::new(
            xt_id,
            slot,
            sequence_number,
            request,
            participating_chains,
            start_time_ms,
        );
        guard
            .execution
            .scp_instances
            .insert(xt_id, instance.clone());
        Ok(instance)
    }

    /// Apply a terminal decision to an active SCP instance.
    #[instrument(skip(self))]
    pub fn process_scp_decision(
        &self,
        xt_id: XtId,
        decided: bool,
        decision_time_ms: u64,
    ) -> StateMachineResult<()> {
        let mut guard = self.inner.lock();
        let instance = guard
            .execution
            .scp_instances
            .get_mut(&xt_id)
            .ok_or_else(|| StateMachineError::NotFound(format!("xt_id {xt_id}")))?;
        if instance.decision.is_none() {
            instance.decision = Some(decided);
            instance.decision_time_ms = Some(decision_time_ms);
        }
        Ok(())
    }

    /// Optional optimization: `Free -> Locked` once the last undecided SCP
    /// becomes decided. Staying in `Free` until seal cutover is also valid.
    pub fn lock_if_all_decided(&self) {
        let mut guard = self.inner.lock();
        if guard.execution.state == Phase::Free
            && !guard.execution.scp_instances.is_empty()
            && guard.execution.undecided_instances().next().is_none()
        {
            guard.execution.state = Phase::Locked;
        }
    }

    /// `Free|Locked -> Sealing`: record the inclusion set (the `XtId`s of
    /// SCPs whose decision is `true`). Immutable once set.
    #[instrument(skip(self, included_xts))]
    pub fn request_seal(&self, included_xts: Vec<XtId>) -> StateMachineResult<()> {
        let mut guard = self.inner.lock();
        if !matches!(guard.execution.state, Phase::Free | Phase::Locked) {
            return Err(StateMachineError::InvalidTransition(format!(
                "request_seal called from {:?}",
                guard.execution.state
            )));
        }
        guard.execution.included_xts = Some(included_xts);
        guard.execution.state = Phase::Sealing;
        Ok(())
    }

    /// `Sealing`: accept an L2 block if it satisfies the outstanding request
    /// for its chain (spec.md §3 `L2Block` acceptance rule).
    #[instrument(skip(self, block))]
    pub fn receive_l2_block(&self, block: L2Block) -> StateMachineResult<bool> {
        let mut guard = self.inner.lock();
        if guard.execution.state != Phase::Sealing {
            return Err(StateMachineError::InvalidTransition(format!(
                "receive_l2_block called from {:?}",
                guard.execution.state
            )));
        }
        let slot = guard.execution.slot;
        let accepted = match guard.execution.l2_block_requests.get(&block.chain_id) {
            Some(request) if request.accepts(&block, slot) => true,
            _ => false,
        };
        if accepted {
            guard
                .execution
                .received_l2_blocks
                .insert(block.chain_id.clone(), block);
        }
        Ok(accepted)
    }

    /// True iff every active chain has submitted a valid block this slot.
    pub fn check_all_l2_blocks_received(&self) -> bool {
        self.inner.lock().execution.all_l2_blocks_received()
    }

    /// `Sealing -> Starting`: the coordinator has built (or failed) the
    /// superblock for this slot; clear back to a blank `Starting` state.
    pub fn finish_slot(&self, slot: u64, next_superblock_number: u64, last_superblock_hash: [u8; 32]) {
        let mut guard = self.inner.lock();
        guard.execution = SlotExecution::starting(slot, next_superblock_number, last_superblock_hash);
    }

    /// Record an attempted (dequeued-and-started) XT, for requeue on
    /// slot failure or rollback.
    pub fn record_attempted(&self, request: sp_types::xt::QueuedXtRequest) {
        self.inner.lock().execution.attempted_requests.push(request);
    }

    /// Clear `attempted_requests` from the current execution in place,
    /// without touching phase or any other field. Used by the rollback
    /// handler right after requeuing them, so a repeated or concurrent
    /// rollback for the same slot cannot requeue the same XTs twice.
    pub fn clear_attempted_requests(&self) {
        self.inner.lock().execution.attempted_requests.clear();
    }

    /// Install `execution` verbatim, preserving its SCP instances, received
    /// L2 blocks and attempted requests. Used by WAL recovery (spec.md §8 S6)
    /// to resume exactly where the last snapshot left off, rather than
    /// re-deriving a blank slot via `begin_slot`.
    pub fn install_snapshot(&self, execution: SlotExecution) {
        let mut guard = self.inner.lock();
        guard.execution = execution;
    }

    /// Clear the current execution entirely, used by the rollback handler
    /// ahead of `seed_l2_block_requests`.
    pub fn reset(&self) {
        let mut guard = self.inner.lock();
        let slot = guard.execution.slot;
        guard.execution = SlotExecution::starting(slot, guard.execution.next_superblock_number, guard.execution.last_superblock_hash);
    }

    /// Install explicit `L2BlockRequest`s for `slot` (bypassing derivation
    /// from the cached last heads) and move straight to `Free`. Used by the
    /// rollback handler (spec.md §4.7 step 7), which has already computed
    /// the exact requests the restarted slot should use.
    #[instrument(skip(self, requests))]
    pub fn seed_l2_block_requests(
        &self,
        slot: u64,
        next_superblock_number: u64,
        last_superblock_hash: [u8; 32],
        requests: Vec<L2BlockRequest>,
        start_time_ms: u64,
    ) {
        let mut guard = self.inner.lock();
        let active_rollups = requests.iter().map(|r| r.chain_id.clone()).collect();
        let map = requests.into_iter().map(|r| (r.chain_id.clone(), r)).collect();
        guard.execution = SlotExecution::begin(
            slot,
            start_time_ms,
            next_superblock_number,
            last_superblock_hash,
            active_rollups,
            map,
        );
    }
}

impl Default for SlotStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_types::xt::XtRequest;

    fn chain(n: u8) -> ChainId {
        ChainId::new(vec![n])
    }

    #[test]
    fn begin_slot_without_known_head_yields_genesis_request() {
        let sm = SlotStateMachine::new();
        sm.begin_slot(100, 1, sp_types::hashing::ZERO_HASH, vec![chain(1)], 0)
            .unwrap();
        let snap = sm.snapshot();
        assert_eq!(snap.state, Phase::Free);
        let req = snap.l2_block_requests.get(&chain(1)).unwrap();
        assert_eq!(req.block_number, 0);
        assert!(req.parent_hash.is_none());
    }

    #[test]
    fn begin_slot_with_known_head_derives_next_request() {
        let sm = SlotStateMachine::new();
        sm.seed_last_head(chain(1), 5, [0xAA; 32]);
        sm.begin_slot(100, 1, sp_types::hashing::ZERO_HASH, vec![chain(1)], 0)
            .unwrap();
        let snap = sm.snapshot();
        let req = snap.l2_block_requests.get(&chain(1)).unwrap();
        assert_eq!(req.block_number, 6);
        assert_eq!(req.parent_hash, Some([0xAA; 32]));
    }

    #[test]
    fn duplicate_start_scp_fails_already_active() {
        let sm = SlotStateMachine::new();
        sm.begin_slot(100, 1, sp_types::hashing::ZERO_HASH, vec![chain(1)], 0)
            .unwrap();
        let req = XtRequest::new(vec![(chain(1), vec![vec![1]])]);
        let xt_id = req.xt_id();
        sm.start_scp(xt_id, req.clone(), vec![chain(1)], 0).unwrap();
        let err = sm.start_scp(xt_id, req, vec![chain(1)], 0).unwrap_err();
        assert!(matches!(err, StateMachineError::AlreadyActive(_)));
    }

    #[test]
    fn decision_is_immutable_once_set() {
        let sm = SlotStateMachine::new();
        sm.begin_slot(100, 1, sp_types::hashing::ZERO_HASH, vec![chain(1)], 0)
            .unwrap();
        let req = XtRequest::new(vec![(chain(1), vec![vec![1]])]);
        let xt_id = req.xt_id();
        sm.start_scp(xt_id, req, vec![chain(1)], 0).unwrap();
        sm.process_scp_decision(xt_id, true, 10).unwrap();
        sm.process_scp_decision(xt_id, false, 20).unwrap();
        let snap = sm.snapshot();
        assert_eq!(snap.scp_instances.get(&xt_id).unwrap().decision, Some(true));
    }

    #[test]
    fn seal_fixes_inclusion_set() {
        let sm = SlotStateMachine::new();
        sm.begin_slot(100, 1, sp_types::hashing::ZERO_HASH, vec![chain(1)], 0)
            .unwrap();
        let req = XtRequest::new(vec![(chain(1), vec![vec![1]])]);
        let xt_id = req.xt_id();
        sm.start_scp(xt_id, req, vec![chain(1)], 0).unwrap();
        sm.process_scp_decision(xt_id, true, 10).unwrap();
        sm.request_seal(vec![xt_id]).unwrap();

        // Deciding another (nonexistent) instance after seal does not touch
        // the fixed inclusion set.
        let snap_before = sm.snapshot().included_xts;
        let snap_after = sm.snapshot().included_xts;
        assert_eq!(snap_before, snap_after);
        assert_eq!(snap_after, Some(vec![xt_id]));
    }

    #[test]
    fn l2_block_boundary_acceptance() {
        let sm = SlotStateMachine::new();
        sm.seed_last_head(chain(1), 0, [0u8; 32]);
        sm.begin_slot(100, 1, sp_types::hashing::ZERO_HASH, vec![chain(1)], 0)
            .unwrap();
        sm.request_seal(vec![]).unwrap();

        let reject = L2Block {
            slot: 100,
            chain_id: chain(1),
            block_number: 0,
            block_hash: [1; 32],
            parent_block_hash: [0; 32],
            included_xts: vec![],
            raw_block: vec![],
        };
        assert!(!sm.receive_l2_block(reject).unwrap());

        let accept = L2Block {
            slot: 100,
            chain_id: chain(1),
            block_number: 1,
            block_hash: [1; 32],
            parent_block_hash: [0; 32],
            included_xts: vec![],
            raw_block: vec![],
        };
        assert!(sm.receive_l2_block(accept).unwrap());
        assert!(sm.check_all_l2_blocks_received());
    }
}
