// Copyright (c) 2018-2025 The Botho Foundation

//! Core data model, deterministic hashing rules and infrastructure-port
//! traits for the Shared Publisher's Superblock Construction Coordinator
//! (see `SPEC_FULL.md` §3, §6).

pub mod error;
pub mod hashing;
pub mod ids;
pub mod l2_block;
pub mod messages;
pub mod ports;
pub mod registry;
pub mod scp_instance;
pub mod slot_execution;
pub mod superblock;
pub mod wal;
pub mod xt;

pub use error::{TypesError, TypesResult};
pub use ids::{ChainId, XtId};
pub use l2_block::{L2Block, L2BlockRequest};
pub use messages::Message;
pub use registry::RollupSpec;
pub use scp_instance::ScpInstance;
pub use slot_execution::{Phase, SlotExecution};
pub use superblock::{Superblock, SuperblockStatus};
pub use wal::{WalEntry, WalEntryKind};
pub use xt::{QueuedXtRequest, XtRequest};
