// Copyright (c) 2018-2025 The Botho Foundation

//! ABI shapes for the dispute-game factory (spec.md §4.5, §9 "no other
//! on-chain surface is modeled").
//!
//! Only the `create` entry point and the two events the coordinator cares
//! about (proposed/rolled-back) are bound; the factory, bridge, mailbox and
//! rollup contracts themselves are out of scope (spec.md §1) and are observed
//! only through this ABI/event surface.

use alloy::sol;

/// `gameType` argument identifying a Compose superblock dispute game
/// (spec.md §4.5).
pub const COMPOSE_GAME_TYPE: u32 = 5555;

sol! {
    #[derive(Debug)]
    struct BootInfo {
        bytes32 l1Head;
        bytes32 l2PreRoot;
        bytes32 l2PostRoot;
        uint64 l2BlockNumber;
        bytes32 rollupConfigHash;
    }

    #[derive(Debug)]
    struct SuperblockAggregationOutputs {
        uint64 superblockNumber;
        bytes32 parentSuperblockBatchHash;
        BootInfo[] bootInfos;
    }

    #[sol(rpc)]
    interface DisputeGameFactory {
        function create(uint32 gameType, bytes32 rootClaim, bytes extraData) external returns (address proxy);

        event OutputProposed(uint256 indexed superblockNumber, bytes32 rootClaim);
        event OutputRolledBack(uint256 indexed superblockNumber);
    }
}
