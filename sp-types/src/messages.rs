// Copyright (c) 2018-2025 The Botho Foundation

//! Wire messages broadcast by the coordinator (spec.md §6 "Emitted - wire
//! messages").
//!
//! Modeled as a `#[non_exhaustive]` enum with serde derive, following
//! `consensus/service.rs`'s `ScpMessage` serde shape in the teacher.

use serde::{Deserialize, Serialize};

use crate::ids::XtId;
use crate::l2_block::L2BlockRequest;
use crate::xt::XtRequest;

/// One semantic payload the coordinator broadcasts to peer publishers.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    /// Emitted on entering a new slot.
    StartSlot {
        slot: u64,
        next_superblock_number: u64,
        last_superblock_hash: [u8; 32],
        l2_block_requests: Vec<L2BlockRequest>,
    },
    /// Emitted per started SCP instance.
    StartSc {
        slot: u64,
        xt_sequence_number: u64,
        xt_request: XtRequest,
        xt_id: XtId,
    },
    /// Emitted at seal cutover.
    RequestSeal { slot: u64, included_xts: Vec<XtId> },
    /// Emitted on SCP decision or force-abort.
    Decided { xt_id: XtId, decision: bool },
    /// Emitted when the consensus coordinator forwards a publisher's vote.
    Vote {
        sender_chain_id: crate::ids::ChainId,
        xt_id: XtId,
        vote: bool,
    },
    /// Emitted on an L1 rollback event.
    RollBackAndStartSlot {
        current_slot: u64,
        next_superblock_number: u64,
        last_superblock_hash: [u8; 32],
        l2_block_requests: Vec<L2BlockRequest>,
    },
}
