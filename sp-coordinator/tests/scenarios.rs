// Copyright (c) 2018-2025 The Botho Foundation

//! End-to-end scenario tests (spec.md §8 S1-S6), driven deterministically
//! through `Coordinator::tick`/`receive_l2_block`/`handle_vote` against
//! `ManualSlotClock` and the in-memory port doubles in
//! `sp_coordinator::testing`.

mod common;

use sp_coordinator::testing::rollup;
use sp_types::hashing::{merkle_root, ZERO_HASH};
use sp_types::ids::ChainId;
use sp_types::l2_block::L2Block;
use sp_types::messages::Message;
use sp_types::ports::{L2BlockStore, SuperblockStore, Wal, XtRequestQueue};
use sp_types::superblock::{Superblock, SuperblockStatus};
use sp_types::xt::{QueuedXtRequest, XtRequest};

use common::{harness, settle};

fn queued(request: XtRequest) -> QueuedXtRequest {
    QueuedXtRequest {
        request,
        submitted_at_ms: 0,
        expires_at_ms: u64::MAX,
        priority: 0,
        attempt_count: 0,
        source_id: "test".into(),
    }
}

fn block(chain: &ChainId, slot: u64, number: u64, hash: [u8; 32]) -> L2Block {
    L2Block {
        slot,
        chain_id: chain.clone(),
        block_number: number,
        block_hash: hash,
        parent_block_hash: ZERO_HASH,
        included_xts: vec![],
        raw_block: vec![],
    }
}

/// S1: two rollups, one cross-rollup XT between them, both blocks arrive
/// before timeout. Expect superblock 1 built, chained off genesis, with the
/// XT included and the Merkle root over exactly the two submitted blocks.
#[tokio::test]
async fn s1_happy_path_two_rollups_one_xt() {
    let a = rollup(0x01, "A");
    let b = rollup(0x02, "B");
    let h = harness(vec![a.clone(), b.clone()], 100);

    h.coordinator.tick().await.unwrap(); // Starting -> Free

    let request = XtRequest::new(vec![
        (a.chain_id.clone(), vec![vec![1, 2, 3]]),
        (b.chain_id.clone(), vec![vec![4, 5]]),
    ]);
    let xt_id = request.xt_id();
    h.queue.enqueue(queued(request)).await.unwrap();

    h.coordinator.tick().await.unwrap(); // Free: starts the SCP (A implicit true)
    h.coordinator
        .handle_vote(xt_id, b.chain_id.clone(), true)
        .unwrap();
    settle().await;

    h.slot_clock.set_seal_time(true);
    h.coordinator.tick().await.unwrap(); // Free -> Sealing, inclusion set fixed

    let block_a = block(&a.chain_id, 100, 1, [0xAA; 32]);
    let block_b = block(&b.chain_id, 100, 1, [0xBB; 32]);
    assert!(h.coordinator.receive_l2_block(block_a.clone()).await.unwrap());
    assert!(h.coordinator.receive_l2_block(block_b.clone()).await.unwrap());

    h.coordinator.tick().await.unwrap(); // Sealing: all blocks received -> build

    let sb = h.superblock_store.get_latest_superblock().await.unwrap().unwrap();
    assert_eq!(sb.number, 1);
    assert_eq!(sb.slot, 100);
    assert_eq!(sb.parent_hash, ZERO_HASH);
    assert_eq!(sb.included_xts, vec![xt_id]);
    assert_eq!(sb.merkle_root, merkle_root(&[block_a, block_b]));
    assert_eq!(sb.status, SuperblockStatus::Submitted);

    // The L2 block store now holds both chains' heads for the next slot.
    assert!(h
        .l2_block_store
        .get_latest_l2_block(&a.chain_id)
        .await
        .unwrap()
        .is_some());
}

/// S2: one XT never reaches a decision before seal cutover and is
/// force-aborted; a second, single-chain XT is accepted instantly but its
/// only participating chain never submits a block, so the slot times out and
/// both attempted XTs are requeued.
#[tokio::test]
async fn s2_force_abort_at_seal_cutover_and_requeue_on_missing_block() {
    let a = rollup(0x01, "A");
    let b = rollup(0x02, "B");
    let h = harness(vec![a.clone(), b.clone()], 200);

    h.coordinator.tick().await.unwrap(); // Starting -> Free

    let undecided = XtRequest::new(vec![
        (a.chain_id.clone(), vec![vec![1]]),
        (b.chain_id.clone(), vec![vec![2]]),
    ]);
    let undecided_id = undecided.xt_id();
    h.queue.enqueue(queued(undecided)).await.unwrap();
    h.coordinator.tick().await.unwrap(); // starts XT1 (A implicit true, B pending)

    let solo = XtRequest::new(vec![(a.chain_id.clone(), vec![vec![9]])]);
    let solo_id = solo.xt_id();
    h.queue.enqueue(queued(solo)).await.unwrap();
    h.coordinator.tick().await.unwrap(); // starts XT2, decides true immediately
    settle().await;

    h.slot_clock.set_seal_time(true);
    h.coordinator.tick().await.unwrap(); // force-abort XT1, seal with [solo_id]
    settle().await;

    let sent = h.transport.sent_messages();
    assert!(sent.iter().any(|m| matches!(
        m,
        Message::Decided { xt_id, decision } if *xt_id == undecided_id && !*decision
    )));
    assert!(sent.iter().any(|m| matches!(
        m,
        Message::RequestSeal { included_xts, .. } if included_xts == &vec![solo_id]
    )));

    // No block ever arrives for chain A; advance the wall clock past the
    // slot so the sealing handler sees a timeout.
    h.slot_clock.set_slot(201);
    h.coordinator.tick().await.unwrap(); // handle_slot_timeout -> fail_slot

    let mut requeued = Vec::new();
    while let Some(q) = h.queue.dequeue().await.unwrap() {
        requeued.push(q.xt_id());
    }
    assert_eq!(requeued.len(), 2);
    assert!(requeued.contains(&undecided_id));
    assert!(requeued.contains(&solo_id));
    assert!(h.superblock_store.get_latest_superblock().await.unwrap().is_none());
}

/// S3: a two-chain XT is fully accepted (both chains vote true) before seal
/// cutover, but only one participating chain's block arrives before the slot
/// advances. A partial superblock is still built, carrying only the blocks
/// that did arrive.
#[tokio::test]
async fn s3_slot_timeout_builds_partial_superblock() {
    let a = rollup(0x01, "A");
    let b = rollup(0x02, "B");
    let h = harness(vec![a.clone(), b.clone()], 300);

    h.coordinator.tick().await.unwrap(); // Starting -> Free

    let request = XtRequest::new(vec![
        (a.chain_id.clone(), vec![vec![1]]),
        (b.chain_id.clone(), vec![vec![2]]),
    ]);
    let xt_id = request.xt_id();
    h.queue.enqueue(queued(request)).await.unwrap();
    h.coordinator.tick().await.unwrap(); // starts the SCP
    h.coordinator
        .handle_vote(xt_id, b.chain_id.clone(), true)
        .unwrap();
    settle().await;

    h.slot_clock.set_seal_time(true);
    h.coordinator.tick().await.unwrap(); // Free -> Sealing, included_xts = [xt_id]

    let block_a = block(&a.chain_id, 300, 1, [0xAA; 32]);
    assert!(h.coordinator.receive_l2_block(block_a.clone()).await.unwrap());
    // Chain B never submits.

    h.slot_clock.set_slot(301);
    h.coordinator.tick().await.unwrap(); // can_build_partial: true (A has a block)

    let sb = h.superblock_store.get_latest_superblock().await.unwrap().unwrap();
    assert_eq!(sb.included_xts, vec![xt_id]);
    assert_eq!(sb.l2_blocks.len(), 1);
    assert_eq!(sb.l2_blocks[0].chain_id, a.chain_id);
    assert_eq!(sb.l2_blocks[0].block_hash, block_a.block_hash);
}

/// S4: L1 rolls back superblock 5. The coordinator restarts from the last
/// valid superblock (4), re-requesting each chain's next block off of its
/// recorded head.
#[tokio::test]
async fn s4_l1_rollback_restarts_from_last_valid_superblock() {
    let a = rollup(0x01, "A");
    let b = rollup(0x02, "B");
    let h = harness(vec![a.clone(), b.clone()], 0);

    let block_a4 = block(&a.chain_id, 104, 4, [0xA4; 32]);
    let block_b4 = block(&b.chain_id, 104, 4, [0xB4; 32]);
    let sb4 = Superblock::new(4, 104, [0x44; 32], 0, vec![block_a4.clone(), block_b4.clone()], vec![]);
    h.superblock_store.store_superblock(&sb4).await.unwrap();

    let mut sb5 = Superblock::new(5, 105, sb4.hash, 0, vec![], vec![]);
    sb5.status = SuperblockStatus::RolledBack;
    h.superblock_store.store_superblock(&sb5).await.unwrap();

    h.coordinator.handle_rollback(5).await.unwrap();

    let sent = h.transport.sent_messages();
    let restart = sent
        .iter()
        .find_map(|m| match m {
            Message::RollBackAndStartSlot {
                current_slot,
                next_superblock_number,
                last_superblock_hash,
                l2_block_requests,
            } => Some((*current_slot, *next_superblock_number, *last_superblock_hash, l2_block_requests.clone())),
            _ => None,
        })
        .expect("a RollBackAndStartSlot broadcast");

    assert_eq!(restart.1, 5); // next_superblock_number = sb4.number + 1
    assert_eq!(restart.2, sb4.hash);
    assert_eq!(restart.0, 106); // rolled_back_slot (105) + 1

    let req_a = restart.3.iter().find(|r| r.chain_id == a.chain_id).unwrap();
    assert_eq!(req_a.block_number, 5);
    assert_eq!(req_a.parent_hash, Some([0xA4; 32]));
    let req_b = restart.3.iter().find(|r| r.chain_id == b.chain_id).unwrap();
    assert_eq!(req_b.block_number, 5);
    assert_eq!(req_b.parent_hash, Some([0xB4; 32]));

    let entries = h.wal.read_entries(0).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.kind == sp_types::wal::WalEntryKind::Rollback));
}

/// Regression test for the history-clobber bug: once a slot's superblock is
/// built, `finish_slot` blanks the live execution back to `Starting` at the
/// same slot number. The completed execution's `attempted_requests` must
/// still be found in history when a rollback for that (by-then-older) slot
/// arrives later, not the blanked-out one.
#[tokio::test]
async fn s4_rollback_requeues_attempted_xt_from_completed_slot() {
    let a = rollup(0x01, "A");
    let b = rollup(0x02, "B");
    let h = harness(vec![a.clone(), b.clone()], 500);

    h.coordinator.tick().await.unwrap(); // Starting -> Free at slot 500

    let request = XtRequest::new(vec![
        (a.chain_id.clone(), vec![vec![1]]),
        (b.chain_id.clone(), vec![vec![2]]),
    ]);
    let xt_id = request.xt_id();
    h.queue.enqueue(queued(request)).await.unwrap();
    h.coordinator.tick().await.unwrap(); // starts the SCP (A implicit true)
    h.coordinator
        .handle_vote(xt_id, b.chain_id.clone(), true)
        .unwrap();
    settle().await;

    h.slot_clock.set_seal_time(true);
    h.coordinator.tick().await.unwrap(); // Free -> Sealing

    let block_a = block(&a.chain_id, 500, 1, [0xAA; 32]);
    let block_b = block(&b.chain_id, 500, 1, [0xBB; 32]);
    assert!(h.coordinator.receive_l2_block(block_a).await.unwrap());
    assert!(h.coordinator.receive_l2_block(block_b).await.unwrap());

    h.coordinator.tick().await.unwrap(); // Sealing -> build + publish superblock 1

    let built = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    assert_eq!(built.slot, 500);

    // A later slot begins before the rollback arrives, as always happens in
    // practice (L1 finality lags the coordinator by at least one slot).
    h.slot_clock.set_slot(501);
    h.coordinator.tick().await.unwrap(); // Starting -> Free at slot 501

    let mut rolled_back = built.clone();
    rolled_back.status = SuperblockStatus::RolledBack;
    h.superblock_store.store_superblock(&rolled_back).await.unwrap();

    h.coordinator.handle_rollback(1).await.unwrap();

    let mut requeued = Vec::new();
    while let Some(q) = h.queue.dequeue().await.unwrap() {
        requeued.push(q.xt_id());
    }
    assert_eq!(requeued, vec![xt_id]);
}

/// A repeated `handle_rollback` call for the same superblock number must not
/// requeue its attempted XTs a second time.
#[tokio::test]
async fn s4_rollback_is_idempotent_across_repeated_calls() {
    let a = rollup(0x01, "A");
    let b = rollup(0x02, "B");
    let h = harness(vec![a.clone(), b.clone()], 600);

    h.coordinator.tick().await.unwrap(); // Starting -> Free at slot 600

    let request = XtRequest::new(vec![
        (a.chain_id.clone(), vec![vec![1]]),
        (b.chain_id.clone(), vec![vec![2]]),
    ]);
    let xt_id = request.xt_id();
    h.queue.enqueue(queued(request)).await.unwrap();
    h.coordinator.tick().await.unwrap(); // starts the SCP (A implicit true)
    h.coordinator
        .handle_vote(xt_id, b.chain_id.clone(), true)
        .unwrap();
    settle().await;

    h.slot_clock.set_seal_time(true);
    h.coordinator.tick().await.unwrap(); // Free -> Sealing

    let block_a = block(&a.chain_id, 600, 1, [0xAA; 32]);
    let block_b = block(&b.chain_id, 600, 1, [0xBB; 32]);
    assert!(h.coordinator.receive_l2_block(block_a).await.unwrap());
    assert!(h.coordinator.receive_l2_block(block_b).await.unwrap());

    h.coordinator.tick().await.unwrap(); // Sealing -> build + publish superblock 1

    let built = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    h.slot_clock.set_slot(601);
    h.coordinator.tick().await.unwrap(); // Starting -> Free at slot 601

    let mut rolled_back = built.clone();
    rolled_back.status = SuperblockStatus::RolledBack;
    h.superblock_store.store_superblock(&rolled_back).await.unwrap();

    h.coordinator.handle_rollback(1).await.unwrap();
    h.coordinator.handle_rollback(1).await.unwrap();

    let mut requeued = Vec::new();
    while let Some(q) = h.queue.dequeue().await.unwrap() {
        requeued.push(q.xt_id());
    }
    assert_eq!(requeued, vec![xt_id]);
}

/// S5: a published superblock's L1 receipt progresses
/// Pending -> Submitted -> Confirmed -> Finalized, polled via
/// `poll_receipts_once`.
#[tokio::test]
async fn s5_receipt_progression_to_finalized() {
    use sp_types::ports::L1TransactionStatus;

    let a = rollup(0x01, "A");
    let h = harness(vec![a.clone()], 700);

    let sb = Superblock::new(1, 700, ZERO_HASH, 0, vec![], vec![]);
    h.coordinator.publish_superblock(sb, &[0u8]).await.unwrap();

    let submitted = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    assert_eq!(submitted.status, SuperblockStatus::Submitted);
    let tx_hash = submitted.l1_transaction_hash.expect("tracked tx hash");

    h.l1.set_status(tx_hash, L1TransactionStatus::Included);
    h.coordinator.poll_receipts_once().await;
    let after_included = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    assert_eq!(after_included.status, SuperblockStatus::Submitted); // Included only flips Pending->Submitted

    h.l1.set_status(tx_hash, L1TransactionStatus::Confirmed);
    h.coordinator.poll_receipts_once().await;
    let after_confirmed = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    assert_eq!(after_confirmed.status, SuperblockStatus::Confirmed);

    h.l1.set_status(tx_hash, L1TransactionStatus::Finalized);
    h.coordinator.poll_receipts_once().await;
    let after_finalized = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    assert_eq!(after_finalized.status, SuperblockStatus::Finalized);

    // Untracked once finalized: a further status flip is no longer polled.
    h.l1.set_status(tx_hash, L1TransactionStatus::Pending);
    h.coordinator.poll_receipts_once().await;
    let after_untrack = h.superblock_store.get_superblock(1).await.unwrap().unwrap();
    assert_eq!(after_untrack.status, SuperblockStatus::Finalized);
}

/// S6: after a crash, `recover` installs the last WAL snapshot verbatim,
/// resuming the in-flight slot instead of starting a fresh one.
#[tokio::test]
async fn s6_wal_recovery_restores_current_execution() {
    let a = rollup(0x01, "A");
    let h = harness(vec![a.clone()], 900);

    h.coordinator.tick().await.unwrap(); // Starting -> Free, persists a snapshot

    let request = XtRequest::new(vec![(a.chain_id.clone(), vec![vec![7]])]);
    let xt_id = request.xt_id();
    h.queue.enqueue(queued(request)).await.unwrap();
    h.coordinator.tick().await.unwrap(); // starts + decides the solo XT, persists

    // A fresh coordinator over the same WAL, as if the process restarted.
    let fresh = harness(vec![a.clone()], 0);
    // Swap in the original WAL so recovery has something to read.
    let deps_wal = h.wal.clone();
    let entries = deps_wal.read_entries(0).await.unwrap();
    for entry in entries {
        fresh.wal.write_entry(entry).await.unwrap();
    }

    fresh.coordinator.recover().await.unwrap();
    // After recovery the state machine should already know about the SCP
    // instance started above, rather than requiring it to be re-derived.
    fresh.slot_clock.set_seal_time(true);
    fresh.coordinator.tick().await.unwrap();
    let sent = fresh.transport.sent_messages();
    assert!(sent.iter().any(|m| matches!(
        m,
        Message::RequestSeal { included_xts, .. } if included_xts.contains(&xt_id)
    )));
}
