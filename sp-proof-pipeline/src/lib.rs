// Copyright (c) 2018-2025 The Botho Foundation

//! Proof pipeline adapter (spec.md §4.4 step 7, §9 "Proof-gated publish").
//!
//! The coordinator only interacts with the Ethereum-epoch batch/prover
//! pipeline through two narrow contracts: "enqueue superblock for proof" and
//! "callback when proof bytes are ready" (spec.md §1 "Out of scope"). This
//! crate models exactly that seam and nothing of the pipeline's internals.
//! Grounded on `bridge/service/src/engine.rs`'s callback-shaped
//! watcher-to-engine hookup.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::instrument;

use sp_types::superblock::Superblock;

/// A boxed, `'static` future with no output, used for the async callback
/// invoked when proof bytes become available.
pub type BoxFuture = Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Invoked with the original superblock and its proof bytes once the
/// pipeline has produced them. Owned by the coordinator, which uses it to
/// drive the deferred L1 publish (spec.md §9 "the pipeline owns the eventual
/// L1 publish via the injected callback").
pub type ProofCallback = Arc<dyn Fn(Superblock, Vec<u8>) -> BoxFuture + Send + Sync>;

/// The coordinator's view of the proof pipeline.
#[async_trait]
pub trait ProofPipeline: Send + Sync {
    /// True iff a superblock must wait for this pipeline's callback before
    /// being published to L1 (spec.md §4.4 step 7 `RequireProof`).
    fn requires_proof(&self) -> bool;

    /// Hand `superblock` to the pipeline. When `requires_proof()` is `true`
    /// this defers the eventual L1 publish to the injected callback; when
    /// `false` this is best-effort bookkeeping only and the coordinator
    /// publishes immediately without waiting.
    async fn enqueue(&self, superblock: Superblock) -> anyhow::Result<()>;
}

/// Proofs disabled: superblocks are published immediately, not handed to any
/// pipeline.
#[derive(Default)]
pub struct NullProofPipeline;

#[async_trait]
impl ProofPipeline for NullProofPipeline {
    fn requires_proof(&self) -> bool {
        false
    }

    async fn enqueue(&self, _superblock: Superblock) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Proofs required: superblocks are held pending until
/// [`CallbackProofPipeline::complete_proof`] is driven by the external
/// collector/prover surface (spec.md §1 "Out of scope: the batch/prover
/// pipeline... and its op-succinct collector HTTP surface").
pub struct CallbackProofPipeline {
    pending: Mutex<HashMap<u64, Superblock>>,
    on_proof: ProofCallback,
}

impl CallbackProofPipeline {
    pub fn new(on_proof: ProofCallback) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            on_proof,
        }
    }

    /// Number of superblocks currently awaiting a proof.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Deliver proof bytes for a previously-enqueued superblock, invoking
    /// the callback. Returns `Ok(false)` if `superblock_number` was not
    /// pending (treated as a liveness no-op, not an error, per spec.md §9
    /// "treat 'proof never arrives' as a liveness concern for the pipeline,
    /// not the coordinator").
    #[instrument(skip(self, proof))]
    pub async fn complete_proof(&self, superblock_number: u64, proof: Vec<u8>) -> anyhow::Result<bool> {
        let superblock = self.pending.lock().remove(&superblock_number);
        match superblock {
            Some(sb) => {
                (self.on_proof)(sb, proof).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ProofPipeline for CallbackProofPipeline {
    fn requires_proof(&self) -> bool {
        true
    }

    async fn enqueue(&self, superblock: Superblock) -> anyhow::Result<()> {
        self.pending.lock().insert(superblock.number, superblock);
        Ok(())
    }
}
