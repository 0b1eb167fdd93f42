// Copyright (c) 2018-2025 The Botho Foundation

//! [`ScpInstance`]: one in-flight cross-rollup transaction inside one slot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ChainId, XtId};
use crate::xt::XtRequest;

/// One in-flight XT inside one slot (spec.md §3 `SCPInstance`).
///
/// Invariants enforced by [`crate::ports::ConsensusCoordinator`]
/// implementations, not by this struct alone:
/// - at most one instance per `XtId` per slot;
/// - once `decision` is `Some`, it is immutable;
/// - `decision == Some(true)` only after every participating chain voted
///   `true`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScpInstance {
    /// Identifier of the cross-rollup transaction this instance decides on.
    pub xt_id: XtId,
    /// The slot this instance lives in.
    pub slot: u64,
    /// Monotonic sequence number among instances started in this slot.
    pub sequence_number: u64,
    /// The underlying transaction bundle.
    pub request: XtRequest,
    /// The distinct chains that must vote for this instance to decide.
    pub participating_chains: Vec<ChainId>,
    /// Votes received so far, keyed by chain.
    pub votes: BTreeMap<ChainId, bool>,
    /// Terminal decision, once reached.
    pub decision: Option<bool>,
    /// Unix millis this instance was started.
    pub start_time_ms: u64,
    /// Unix millis the decision was reached, if any.
    pub decision_time_ms: Option<u64>,
}

impl ScpInstance {
    /// Start a fresh, undecided instance.
    pub fn new(
        xt_id: XtId,
        slot: u64,
        sequence_number: u64,
        request: XtRequest,
        participating_chains: Vec<ChainId>,
        start_time_ms: u64,
    ) -> Self {
        Self {
            xt_id,
            slot,
            sequence_number,
            request,
            participating_chains,
            votes: BTreeMap::new(),
            decision: None,
            start_time_ms,
            decision_time_ms: None,
        }
    }

    /// True iff every participating chain has voted `true`.
    pub fn all_voted_true(&self) -> bool {
        self.participating_chains
            .iter()
            .all(|chain| matches!(self.votes.get(chain), Some(true)))
    }

    /// True iff at least one participating chain has voted `false`.
    pub fn any_voted_false(&self) -> bool {
        self.participating_chains
            .iter()
            .any(|chain| matches!(self.votes.get(chain), Some(false)))
    }

    /// True iff this instance is still awaiting a decision.
    pub fn is_pending(&self) -> bool {
        self.decision.is_none()
    }
}
