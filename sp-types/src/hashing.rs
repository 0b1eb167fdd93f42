// Copyright (c) 2018-2025 The Botho Foundation

//! Deterministic hashing rules (spec.md §3, §4.4, §9 "Deterministic hashing").
//!
//! All multi-byte integers in hashed payloads are big-endian 64-bit; all
//! containers that are hashed are canonically ordered first.

use sha3::{Digest, Keccak256};

use crate::l2_block::L2Block;

/// 32 zero bytes — the canonical "nothing here" hash (genesis `ParentHash`,
/// empty-block-set `MerkleRoot`).
pub const ZERO_HASH: [u8; 32] = [0u8; 32];

/// `keccak256` over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Big-endian 64-bit encoding, used for every integer field that participates
/// in a hash.
pub fn be64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// One Merkle leaf: `keccak256(ChainID ‖ BlockHash ‖ BE64(BlockNumber))`.
fn leaf(block: &L2Block) -> [u8; 32] {
    keccak256(&[
        block.chain_id.as_bytes(),
        &block.block_hash,
        &be64(block.block_number),
    ])
}

/// Build the canonical Merkle root over a set of L2 blocks.
///
/// Blocks are first sorted by raw `ChainID` (lexicographic byte order), then
/// leaves are hashed and combined pairwise (`keccak256(left ‖ right)`),
/// duplicating the last node at any odd level. An empty block set yields
/// [`ZERO_HASH`].
pub fn merkle_root(blocks: &[L2Block]) -> [u8; 32] {
    if blocks.is_empty() {
        return ZERO_HASH;
    }

    let mut sorted: Vec<&L2Block> = blocks.iter().collect();
    sorted.sort_by(|a, b| a.chain_id.as_bytes().cmp(b.chain_id.as_bytes()));

    let mut level: Vec<[u8; 32]> = sorted.iter().map(|b| leaf(b)).collect();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| keccak256(&[&pair[0], &pair[1]]))
            .collect();
    }

    level[0]
}

/// `Hash = keccak256(BE64(Number) ‖ BE64(Slot) ‖ ParentHash ‖ MerkleRoot)`.
pub fn superblock_hash(number: u64, slot: u64, parent_hash: &[u8; 32], merkle_root: &[u8; 32]) -> [u8; 32] {
    keccak256(&[&be64(number), &be64(slot), parent_hash, merkle_root])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ChainId;

    fn block(chain: &[u8], number: u64, hash: u8) -> L2Block {
        L2Block {
            slot: 1,
            chain_id: ChainId::new(chain.to_vec()),
            block_number: number,
            block_hash: [hash; 32],
            parent_block_hash: ZERO_HASH,
            included_xts: vec![],
            raw_block: vec![],
        }
    }

    #[test]
    fn empty_block_set_yields_zero_root() {
        assert_eq!(merkle_root(&[]), ZERO_HASH);
    }

    #[test]
    fn merkle_root_is_permutation_invariant() {
        let a = block(&[0x01], 1, 0xAA);
        let b = block(&[0x02], 1, 0xBB);
        let c = block(&[0x03], 1, 0xCC);

        let forward = merkle_root(&[a.clone(), b.clone(), c.clone()]);
        let shuffled = merkle_root(&[c, a, b]);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn merkle_root_changes_with_block_hash() {
        let a = block(&[0x01], 1, 0xAA);
        let mut a2 = a.clone();
        a2.block_hash = [0xFF; 32];

        assert_ne!(merkle_root(&[a]), merkle_root(&[a2]));
    }

    #[test]
    fn superblock_hash_is_deterministic() {
        let h1 = superblock_hash(1, 100, &ZERO_HASH, &ZERO_HASH);
        let h2 = superblock_hash(1, 100, &ZERO_HASH, &ZERO_HASH);
        assert_eq!(h1, h2);

        let h3 = superblock_hash(2, 100, &ZERO_HASH, &ZERO_HASH);
        assert_ne!(h1, h3);
    }
}
