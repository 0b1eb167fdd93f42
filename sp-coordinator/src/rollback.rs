// Copyright (c) 2018-2025 The Botho Foundation

//! The L1 rollback handler (spec.md §4.7): invoked by the event watcher when
//! an `OutputRolledBack` event is observed, after the triggering superblock
//! has already been marked `RolledBack` and untracked by the caller.

use std::cmp::max;

use tracing::{info, warn};

use sp_types::hashing::ZERO_HASH;
use sp_types::ids::ChainId;
use sp_types::l2_block::L2BlockRequest;
use sp_types::messages::Message;
use sp_types::ports::{Registry, Transport};
use sp_types::wal::{WalEntry, WalEntryKind};

use crate::coordinator::{now_ms, Coordinator};
use crate::error::{CoordinatorError, CoordinatorResult};

impl Coordinator {
    /// Roll the coordinator back to the last valid superblock before
    /// `rolled_back_number` and restart from there.
    pub async fn handle_rollback(&self, rolled_back_number: u64) -> CoordinatorResult<()> {
        let rolled_back = self
            .superblock_store
            .get_superblock(rolled_back_number)
            .await
            .map_err(CoordinatorError::persistence)?
            .ok_or(CoordinatorError::RollbackTargetMissing(rolled_back_number))?;
        let rolled_back_slot = rolled_back.slot;

        // 1. Find last-valid superblock (may be None: restart from genesis).
        let last_valid = self.find_last_valid_superblock().await?;

        // 2. Per-chain L2BlockRequests for the active rollups.
        let rollups = self
            .registry
            .get_active_rollups()
            .await
            .map_err(CoordinatorError::persistence)?;
        let active: Vec<ChainId> = rollups.into_iter().map(|r| r.chain_id).collect();
        let mut requests = Vec::with_capacity(active.len());
        for chain_id in &active {
            let from_last_valid = last_valid
                .as_ref()
                .and_then(|sb| sb.l2_blocks.iter().find(|b| &b.chain_id == chain_id));
            let request = if let Some(block) = from_last_valid {
                L2BlockRequest::from_head(chain_id.clone(), block.block_number, block.block_hash)
            } else if let Some(block) = self
                .l2_block_store
                .get_latest_l2_block(chain_id)
                .await
                .map_err(CoordinatorError::persistence)?
            {
                L2BlockRequest::from_head(chain_id.clone(), block.block_number, block.block_hash)
            } else {
                L2BlockRequest::genesis(chain_id.clone())
            };
            requests.push(request);
        }

        // 3. Requeue the rolled-back slot's attempted XTs exactly once.
        let live_is_rolled_back_slot = self.state_machine.current_slot() == rolled_back_slot;
        let rolled_back_execution = if live_is_rolled_back_slot {
            Some(self.state_machine.snapshot())
        } else {
            self.history.get(rolled_back_slot)
        };
        if let Some(mut execution) = rolled_back_execution {
            for request in &execution.attempted_requests {
                if let Err(e) = self.queue.requeue_for_slot(request.clone()).await {
                    warn!(error = %e, "failed to requeue rolled-back attempted request");
                }
            }
            // Clear the snapshot's attempted requests in place immediately
            // after requeuing, so a repeated `handle_rollback` call for the
            // same superblock number (or one racing in concurrently) finds
            // nothing left to requeue.
            execution.attempted_requests.clear();
            if live_is_rolled_back_slot {
                self.state_machine.clear_attempted_requests();
            } else {
                self.history.push(execution);
            }
        }

        // 4. Restart parameters.
        let next_superblock_number = last_valid.as_ref().map(|sb| sb.number + 1).unwrap_or(1);
        let last_hash = last_valid.as_ref().map(|sb| sb.hash).unwrap_or(ZERO_HASH);
        let current_slot = max(
            max(self.slot_manager.get_current_slot(), self.state_machine.current_slot()),
            rolled_back_slot + 1,
        );

        // 5. Rollback WAL entry.
        let data = bincode::serialize(&rolled_back_number).map_err(CoordinatorError::validation)?;
        self.wal
            .write_entry(WalEntry {
                sequence: 0,
                slot: current_slot,
                kind: WalEntryKind::Rollback,
                data,
                timestamp_ms: now_ms(),
            })
            .await
            .map_err(CoordinatorError::persistence)?;

        // 6. Broadcast the restart.
        self.transport
            .broadcast(
                Message::RollBackAndStartSlot {
                    current_slot,
                    next_superblock_number,
                    last_superblock_hash: last_hash,
                    l2_block_requests: requests.clone(),
                },
                None,
            )
            .await
            .map_err(CoordinatorError::transport)?;

        // 8 (history bound first, so the fresh snapshot below survives it).
        self.history.erase_from(rolled_back_slot);

        // 7. Re-seed last-heads, reset, install the restart requests.
        for block in last_valid.iter().flat_map(|sb| sb.l2_blocks.iter()) {
            self.state_machine
                .seed_last_head(block.chain_id.clone(), block.block_number, block.block_hash);
        }
        self.state_machine.reset();
        self.state_machine
            .seed_l2_block_requests(current_slot, next_superblock_number, last_hash, requests, now_ms());
        self.persist_snapshot().await?;

        info!(
            rolled_back_number,
            rolled_back_slot, current_slot, next_superblock_number, "rollback handled"
        );
        Ok(())
    }
}
