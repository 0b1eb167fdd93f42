// Copyright (c) 2018-2025 The Botho Foundation

//! `L1BridgeError` (spec.md §7 "per-component typed errors").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum L1BridgeError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("L1 RPC call failed: {0}")]
    Rpc(String),

    #[error("transaction {0:x?} is not tracked")]
    NotTracked([u8; 32]),
}
