// Copyright (c) 2018-2025 The Botho Foundation

//! [`RollupSpec`]: the static per-rollup metadata a concrete `Registry`
//! implementation resolves `GetActiveRollups` from.
//!
//! Not part of spec.md's entity list (the registry is treated as pure
//! external infrastructure there); a concrete node binary still needs
//! something to configure, grounded on `botho/src/config.rs`'s
//! `NetworkConfig`.

use serde::{Deserialize, Serialize};

use crate::ids::ChainId;

/// Static configuration for one rollup participating in the network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RollupSpec {
    /// The rollup's chain identifier.
    pub chain_id: ChainId,
    /// Human-readable name, used only for logging.
    pub display_name: String,
}
