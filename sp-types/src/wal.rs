// Copyright (c) 2018-2025 The Botho Foundation

//! [`WalEntry`] / [`WalEntryKind`]: the write-ahead-log record envelope
//! (spec.md §6 "entry types at minimum: `SlotSnapshot`, `Rollback`").

use serde::{Deserialize, Serialize};

/// The kind of a WAL entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum WalEntryKind {
    /// A serialized [`crate::slot_execution::SlotExecution`] snapshot.
    SlotSnapshot,
    /// A record of an L1 rollback having been handled.
    Rollback,
}

/// One append-only WAL record.
///
/// `sequence` is assigned by the WAL writer and is monotonic; recovery
/// (spec.md §8 S6) replays entries in `sequence` order. SPEC_FULL.md §3 adds
/// this field over spec.md's bare `{Slot, Type, Data, Timestamp}` because a
/// pure-timestamp ordering is not collision-free at sub-millisecond write
/// rates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonic write sequence number.
    pub sequence: u64,
    /// The slot this entry pertains to.
    pub slot: u64,
    /// What kind of entry this is.
    pub kind: WalEntryKind,
    /// Opaque, kind-specific payload (bincode-encoded by the writer).
    pub data: Vec<u8>,
    /// Unix millis this entry was written.
    pub timestamp_ms: u64,
}
