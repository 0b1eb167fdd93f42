// Copyright (c) 2018-2025 The Botho Foundation

//! [`Superblock`] and its status lifecycle.

use serde::{Deserialize, Serialize};

use crate::hashing::{merkle_root, superblock_hash, ZERO_HASH};
use crate::ids::XtId;
use crate::l2_block::L2Block;

/// Status lifecycle: `Pending -> Submitted -> Confirmed -> Finalized`, or
/// `Pending -> RolledBack`, or `Submitted -> Pending` (on tx failure).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SuperblockStatus {
    /// Built and hashed, not yet submitted to L1.
    Pending,
    /// An L1 transaction has been sent for this superblock.
    Submitted,
    /// The L1 transaction has been included and observed as confirmed.
    Confirmed,
    /// The L1 transaction has reached finality.
    Finalized,
    /// L1 invalidated this superblock; it is no longer part of the canonical
    /// history.
    RolledBack,
}

/// A canonical cross-rollup record: one L2 block per active rollup plus the
/// XTs included in the slot (spec.md §3 `Superblock`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Superblock {
    /// Strictly monotonic across non-rolled-back history; genesis is 1.
    pub number: u64,
    /// The slot this superblock was built for.
    pub slot: u64,
    /// Hash of the most recent non-rolled-back superblock (zero for
    /// genesis).
    pub parent_hash: [u8; 32],
    /// Canonical Merkle root over `l2_blocks` (see [`crate::hashing::merkle_root`]).
    pub merkle_root: [u8; 32],
    /// Unix millis this superblock was assembled.
    pub timestamp_ms: u64,
    /// One block per active rollup that contributed to this slot.
    pub l2_blocks: Vec<L2Block>,
    /// XTs accepted (decided `true`) in this slot, as 32-byte hashes.
    pub included_xts: Vec<XtId>,
    /// Lifecycle status.
    pub status: SuperblockStatus,
    /// `keccak256(BE64(number) ‖ BE64(slot) ‖ parent_hash ‖ merkle_root)`,
    /// computed at construction time so a zero hash can never reach the
    /// publish path (spec.md §9 Open Question 2).
    pub hash: [u8; 32],
    /// L1 transaction hash once submitted.
    pub l1_transaction_hash: Option<[u8; 32]>,
}

impl Superblock {
    /// Build a new, `Pending` superblock. `hash` and `merkle_root` are
    /// computed here, never left as caller-supplied fields, so that a
    /// zero/unset hash can never be published (spec.md §9 Open Question 2).
    pub fn new(
        number: u64,
        slot: u64,
        parent_hash: [u8; 32],
        timestamp_ms: u64,
        l2_blocks: Vec<L2Block>,
        included_xts: Vec<XtId>,
    ) -> Self {
        let root = merkle_root(&l2_blocks);
        let hash = superblock_hash(number, slot, &parent_hash, &root);
        Self {
            number,
            slot,
            parent_hash,
            merkle_root: root,
            timestamp_ms,
            l2_blocks,
            included_xts,
            status: SuperblockStatus::Pending,
            hash,
            l1_transaction_hash: None,
        }
    }

    /// The genesis parent hash: 32 zero bytes.
    pub fn genesis_parent_hash() -> [u8; 32] {
        ZERO_HASH
    }

    /// Recompute [`Self::hash`] from the current fields and compare against
    /// the stored value (spec.md §8 invariant 2, "hash determinism").
    pub fn hash_is_consistent(&self) -> bool {
        let root = merkle_root(&self.l2_blocks);
        root == self.merkle_root
            && superblock_hash(self.number, self.slot, &self.parent_hash, &self.merkle_root) == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ChainId;

    fn block(chain: u8, number: u64, hash: u8) -> L2Block {
        L2Block {
            slot: 100,
            chain_id: ChainId::new(vec![chain]),
            block_number: number,
            block_hash: [hash; 32],
            parent_block_hash: [0u8; 32],
            included_xts: vec![],
            raw_block: vec![],
        }
    }

    #[test]
    fn genesis_superblock_has_number_one_and_zero_parent() {
        let sb = Superblock::new(1, 100, Superblock::genesis_parent_hash(), 0, vec![], vec![]);
        assert_eq!(sb.number, 1);
        assert_eq!(sb.parent_hash, ZERO_HASH);
        assert_ne!(sb.hash, ZERO_HASH, "hash must never be zero once constructed");
    }

    #[test]
    fn hash_determinism_round_trips() {
        let sb = Superblock::new(
            5,
            100,
            [0x11; 32],
            0,
            vec![block(1, 1, 0xAA), block(2, 1, 0xBB)],
            vec![],
        );
        assert!(sb.hash_is_consistent());

        let mut tampered = sb.clone();
        tampered.merkle_root = [0u8; 32];
        assert!(!tampered.hash_is_consistent());
    }

    #[test]
    fn child_parent_hash_chains_to_parent_hash_field() {
        let a = Superblock::new(1, 100, ZERO_HASH, 0, vec![block(1, 1, 0xAA)], vec![]);
        let b = Superblock::new(2, 101, a.hash, 0, vec![block(1, 2, 0xBB)], vec![]);
        assert_eq!(b.parent_hash, a.hash);
        assert!(b.number > a.number);
    }
}
