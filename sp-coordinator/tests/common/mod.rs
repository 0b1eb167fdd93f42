// Copyright (c) 2018-2025 The Botho Foundation

//! Shared test harness for the scenario suite, following `botho/tests/`'s
//! layout of one `common` module backing several `tests/*.rs` files.

use std::sync::Arc;

use sp_coordinator::testing::{
    shared, MemL2BlockStore, MemRegistry, MemSuperblockStore, MemTransport, MemWal,
    MemXtRequestQueue,
};
use sp_coordinator::{Coordinator, CoordinatorConfig, CoordinatorDeps};
use sp_l1_bridge::testing::MockL1Publisher;
use sp_proof_pipeline::NullProofPipeline;
use sp_slot_clock::ManualSlotClock;
use sp_types::registry::RollupSpec;

/// Every port double a scenario test needs a handle to, plus the coordinator
/// itself.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub slot_clock: Arc<ManualSlotClock>,
    pub superblock_store: Arc<MemSuperblockStore>,
    pub l2_block_store: Arc<MemL2BlockStore>,
    pub queue: Arc<MemXtRequestQueue>,
    pub wal: Arc<MemWal>,
    pub transport: Arc<MemTransport>,
    pub l1: Arc<MockL1Publisher>,
}

/// Wire a coordinator against entirely in-memory ports, starting at
/// `start_slot` with `rollups` as the active set.
pub fn harness(rollups: Vec<RollupSpec>, start_slot: u64) -> Harness {
    let slot_clock = shared(ManualSlotClock::new(start_slot));
    let superblock_store = shared(MemSuperblockStore::default());
    let l2_block_store = shared(MemL2BlockStore::default());
    let queue = shared(MemXtRequestQueue::default());
    let registry = shared(MemRegistry::new(rollups));
    let wal = shared(MemWal::default());
    let transport = shared(MemTransport::new());
    let l1 = shared(MockL1Publisher::default());

    let deps = CoordinatorDeps {
        slot_manager: slot_clock.clone(),
        superblock_store: superblock_store.clone(),
        l2_block_store: l2_block_store.clone(),
        queue: queue.clone(),
        registry,
        wal: wal.clone(),
        transport: transport.clone(),
        l1: l1.clone(),
        proof_pipeline: shared(NullProofPipeline),
    };
    let coordinator = Coordinator::new(deps, CoordinatorConfig::default());

    Harness {
        coordinator,
        slot_clock,
        superblock_store,
        l2_block_store,
        queue,
        wal,
        transport,
        l1,
    }
}

/// Give background tasks (the decision-relay task, SCP instance timers) a
/// chance to run on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
