// Copyright (c) 2018-2025 The Botho Foundation

//! [`L2Block`] and [`L2BlockRequest`].

use serde::{Deserialize, Serialize};

use crate::ids::{ChainId, XtId};

/// A rollup's contribution to a slot: one L2 block for one chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct L2Block {
    /// The slot this block was submitted for.
    pub slot: u64,
    /// Which rollup produced this block.
    pub chain_id: ChainId,
    /// The rollup-local block number.
    pub block_number: u64,
    /// The rollup-local block hash.
    pub block_hash: [u8; 32],
    /// The rollup-local parent block hash.
    pub parent_block_hash: [u8; 32],
    /// XTs this block claims to include.
    pub included_xts: Vec<XtId>,
    /// Opaque raw block bytes, passed through to the proof pipeline.
    pub raw_block: Vec<u8>,
}

/// Per-chain "what's acceptable next" the coordinator asks for at the start
/// of a slot: `{ChainID, first acceptable BlockNumber, expected ParentHash}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct L2BlockRequest {
    /// Which rollup this request targets.
    pub chain_id: ChainId,
    /// First block number that will be accepted.
    pub block_number: u64,
    /// Expected parent hash, or `None` if there is no known head yet.
    pub parent_hash: Option<[u8; 32]>,
}

impl L2BlockRequest {
    /// A request seeded from a known chain head: `number = head + 1, parent
    /// = head_hash`.
    pub fn from_head(chain_id: ChainId, head_number: u64, head_hash: [u8; 32]) -> Self {
        Self {
            chain_id,
            block_number: head_number + 1,
            parent_hash: Some(head_hash),
        }
    }

    /// A request for a chain with no known head yet: `{number: 0, parent:
    /// None}`.
    pub fn genesis(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            block_number: 0,
            parent_hash: None,
        }
    }

    /// True iff `block` satisfies this request: same chain, `slot` matches
    /// the current slot, and `block_number >= self.block_number` (blocks
    /// "ahead" of the request are accepted; only strictly older ones are
    /// rejected).
    pub fn accepts(&self, block: &L2Block, current_slot: u64) -> bool {
        block.slot == current_slot
            && block.chain_id == self.chain_id
            && block.block_number >= self.block_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(slot: u64, chain: u8, number: u64) -> L2Block {
        L2Block {
            slot,
            chain_id: ChainId::new(vec![chain]),
            block_number: number,
            block_hash: [0u8; 32],
            parent_block_hash: [0u8; 32],
            included_xts: vec![],
            raw_block: vec![],
        }
    }

    #[test]
    fn boundary_acceptance() {
        let req = L2BlockRequest::from_head(ChainId::new(vec![1]), 0, [0u8; 32]);
        assert_eq!(req.block_number, 1);

        assert!(!req.accepts(&block(100, 1, 0), 100), "number == min - 1 rejected");
        assert!(req.accepts(&block(100, 1, 1), 100), "number == min accepted");
        assert!(req.accepts(&block(100, 1, 5), 100), "number == min + k accepted");
    }

    #[test]
    fn wrong_slot_or_chain_rejected() {
        let req = L2BlockRequest::from_head(ChainId::new(vec![1]), 0, [0u8; 32]);
        assert!(!req.accepts(&block(99, 1, 1), 100));
        assert!(!req.accepts(&block(100, 2, 1), 100));
    }
}
