// Copyright (c) 2018-2025 The Botho Foundation

//! Cross-rollup transaction requests ([`XtRequest`]) and their queued form
//! ([`QueuedXtRequest`]).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::hashing::keccak256;
use crate::ids::{ChainId, XtId};

/// A bundle of per-chain transaction lists: a sequence of
/// `(ChainID, [raw-tx, ...])`. The [`XtId`] is a deterministic hash of the
/// canonical encoding.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct XtRequest {
    /// Per-chain raw transaction bundles, in submission order.
    pub chains: Vec<(ChainId, Vec<Vec<u8>>)>,
}

impl XtRequest {
    /// Construct a request from per-chain transaction bundles.
    pub fn new(chains: Vec<(ChainId, Vec<Vec<u8>>)>) -> Self {
        Self { chains }
    }

    /// The distinct chains this request references, i.e. the participating
    /// chains.
    pub fn participating_chains(&self) -> Vec<ChainId> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (chain, _) in &self.chains {
            if seen.insert(chain.clone()) {
                out.push(chain.clone());
            }
        }
        out
    }

    /// Canonical encoding used as the preimage for [`Self::xt_id`]: for each
    /// `(chain, txs)` pair in submission order, `len(chain) ‖ chain ‖
    /// count(txs) ‖ (len(tx) ‖ tx)*`.
    fn canonical_encoding(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (chain, txs) in &self.chains {
            buf.extend_from_slice(&(chain.as_bytes().len() as u64).to_be_bytes());
            buf.extend_from_slice(chain.as_bytes());
            buf.extend_from_slice(&(txs.len() as u64).to_be_bytes());
            for tx in txs {
                buf.extend_from_slice(&(tx.len() as u64).to_be_bytes());
                buf.extend_from_slice(tx);
            }
        }
        buf
    }

    /// Deterministic identifier: `keccak256(canonical_encoding)`.
    pub fn xt_id(&self) -> XtId {
        XtId::new(keccak256(&[&self.canonical_encoding()]))
    }
}

/// An [`XtRequest`] with submission/expiration timestamps, priority, attempt
/// count and source id, as it sits in the [`crate::ports::XtRequestQueue`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedXtRequest {
    /// The underlying cross-rollup transaction bundle.
    pub request: XtRequest,
    /// Unix millis at which this entry was enqueued.
    pub submitted_at_ms: u64,
    /// Unix millis after which this entry is no longer eligible to start.
    pub expires_at_ms: u64,
    /// Scheduling priority; higher is served first by implementations that
    /// order the queue (the ordering itself is a `XtRequestQueue` concern).
    pub priority: u32,
    /// Number of times this entry has been dequeued and attempted.
    pub attempt_count: u32,
    /// Opaque identifier of the chain/client that submitted this request.
    pub source_id: String,
}

impl QueuedXtRequest {
    /// True iff `now_ms` is past this entry's expiration.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms < now_ms
    }

    /// The [`XtId`] of the wrapped request.
    pub fn xt_id(&self) -> XtId {
        self.request.xt_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xt_id_is_order_sensitive_and_deterministic() {
        let a = XtRequest::new(vec![
            (ChainId::new(vec![1]), vec![vec![1, 2, 3]]),
            (ChainId::new(vec![2]), vec![vec![4, 5]]),
        ]);
        let b = XtRequest::new(vec![
            (ChainId::new(vec![2]), vec![vec![4, 5]]),
            (ChainId::new(vec![1]), vec![vec![1, 2, 3]]),
        ]);

        assert_eq!(a.xt_id(), a.xt_id());
        assert_ne!(a.xt_id(), b.xt_id());
    }

    #[test]
    fn participating_chains_dedupes_preserving_first_seen_order() {
        let req = XtRequest::new(vec![
            (ChainId::new(vec![1]), vec![vec![1]]),
            (ChainId::new(vec![2]), vec![vec![2]]),
            (ChainId::new(vec![1]), vec![vec![3]]),
        ]);
        let chains = req.participating_chains();
        assert_eq!(chains, vec![ChainId::new(vec![1]), ChainId::new(vec![2])]);
    }

    #[test]
    fn expired_head_is_dropped() {
        let q = QueuedXtRequest {
            request: XtRequest::new(vec![]),
            submitted_at_ms: 0,
            expires_at_ms: 100,
            priority: 0,
            attempt_count: 0,
            source_id: "a".into(),
        };
        assert!(q.is_expired(101));
        assert!(!q.is_expired(100));
        assert!(!q.is_expired(50));
    }
}
