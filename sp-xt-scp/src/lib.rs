// Copyright (c) 2018-2025 The Botho Foundation

//! The XT consensus supervisor (spec.md §4.3): manages a population of
//! [`sp_types::ScpInstance`]s, one per active cross-rollup transaction.
//!
//! Grounded on `botho/src/consensus/service.rs`'s `ConsensusService`
//! (pending/proposed value maps, `Arc<RwLock<SharedValidationState>>`,
//! timer-driven finalization), adapted from "propose transactions for a
//! single chain's SCP ballot protocol" to "collect per-chain boolean votes
//! for one cross-rollup transaction."

pub mod error;
pub mod runner;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{instrument, warn};

use error::{ScpSupervisorError, ScpSupervisorResult};
use runner::ScpRunner;
use sp_types::ids::{ChainId, XtId};
use sp_types::ports::{ConsensusCoordinator, DecisionState};
use sp_types::scp_instance::ScpInstance;
use sp_types::xt::QueuedXtRequest;

/// What triggered an instance's finalization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FinalizeSource {
    /// A vote completed the decision.
    Vote,
    /// The per-instance timer fired before a decision was reached.
    Timeout,
    /// The coordinator force-aborted this instance at seal cutover.
    ForceAbort,
}

/// A finalized instance's terminal record.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub instance: ScpInstance,
    pub accepted: bool,
    pub source: FinalizeSource,
    pub started_at_ms: u64,
    pub finalized_at_ms: u64,
}

/// Hook invoked exactly once per instance admitted to the supervisor,
/// including failure paths (duplicate `XtId`, construction errors), to
/// release the participating chains (spec.md §9 "Hook + supervisor
/// coupling").
pub type FinalizeHook = Arc<dyn Fn(&ScpInstance) + Send + Sync>;

struct ActiveInstance {
    runner: ScpRunner,
    instance: ScpInstance,
    timer: JoinHandle<()>,
    finalized: Arc<AtomicBool>,
}

struct Inner {
    active: Mutex<HashMap<XtId, ActiveInstance>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    hook: FinalizeHook,
    instance_timeout: Duration,
    max_history: usize,
    history_retention: Duration,
    now_ms: Box<dyn Fn() -> u64 + Send + Sync>,
}

/// Manages the lifecycle of every in-flight cross-rollup transaction.
#[derive(Clone)]
pub struct ScpSupervisor {
    inner: Arc<Inner>,
}

impl ScpSupervisor {
    /// Build a supervisor. `now_ms` lets tests substitute a deterministic
    /// clock for instance timestamps.
    pub fn new(
        instance_timeout: Duration,
        max_history: usize,
        history_retention: Duration,
        hook: FinalizeHook,
        now_ms: impl Fn() -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: Mutex::new(HashMap::new()),
                history: Mutex::new(VecDeque::new()),
                hook,
                instance_timeout,
                max_history,
                history_retention,
                now_ms: Box::new(now_ms),
            }),
        }
    }

    fn now(&self) -> u64 {
        (self.inner.now_ms)()
    }

    /// Start a new instance. Fails with [`ScpSupervisorError::AlreadyActive`]
    /// if one is already active for `xt_id`; on any registration failure the
    /// finalize hook is still invoked for the rejected attempt so its
    /// participating chains are released.
    #[instrument(skip(self, request, participating_chains))]
    pub fn start_instance(
        &self,
        slot: u64,
        sequence_number: u64,
        request: QueuedXtRequest,
        xt_id: XtId,
        participating_chains: Vec<ChainId>,
    ) -> ScpSupervisorResult<()> {
        let started_at = self.now();
        let instance = ScpInstance::new(
            xt_id,
            slot,
            sequence_number,
            request.request.clone(),
            participating_chains.clone(),
            started_at,
        );

        let mut active = self.inner.active.lock();
        if active.contains_key(&xt_id) {
            drop(active);
            (self.inner.hook)(&instance);
            return Err(ScpSupervisorError::AlreadyActive(xt_id.to_string()));
        }

        let runner = ScpRunner::new(participating_chains);
        if matches!(runner.decision_state(), DecisionState::Pending) {
            let inner = self.inner.clone();
            let timeout = self.inner.instance_timeout;
            let timer = tokio::spawn(async move {
                tokio::time::sleep_until(Instant::now() + timeout).await;
                let decision = {
                    let mut active = inner.active.lock();
                    match active.get_mut(&xt_id) {
                        Some(entry) => {
                            entry.runner.timeout();
                            entry.runner.decision()
                        }
                        None => return,
                    }
                };
                if let Some(decided) = decision {
                    Inner::finalize(&inner, xt_id, decided, FinalizeSource::Timeout);
                }
            });
            active.insert(
                xt_id,
                ActiveInstance {
                    runner,
                    instance,
                    timer,
                    finalized: Arc::new(AtomicBool::new(false)),
                },
            );
            Ok(())
        } else {
            // A single-chain (initiator-only) instance decides immediately;
            // still goes through the active map briefly so try_finalize's
            // once-guard and history bookkeeping run uniformly.
            let finalized = Arc::new(AtomicBool::new(false));
            let decision = runner.decision().unwrap_or(false);
            active.insert(
                xt_id,
                ActiveInstance {
                    runner,
                    instance,
                    timer: tokio::spawn(async {}),
                    finalized,
                },
            );
            drop(active);
            self.try_finalize(xt_id, decision, FinalizeSource::Vote);
            Ok(())
        }
    }

    /// Route an externally-observed vote to its instance.
    #[instrument(skip(self))]
    pub fn handle_vote(&self, xt_id: XtId, chain: ChainId, vote: bool) -> ScpSupervisorResult<()> {
        let mut active = self.inner.active.lock();
        let entry = active
            .get_mut(&xt_id)
            .ok_or_else(|| ScpSupervisorError::NotFound(xt_id.to_string()))?;
        entry.runner.vote(chain, vote);
        let decision = entry.runner.decision();
        drop(active);
        if let Some(decided) = decision {
            self.try_finalize(xt_id, decided, FinalizeSource::Vote);
        }
        Ok(())
    }

    /// Force a decision (used by the coordinator's force-abort path at seal
    /// cutover). Idempotent on an already-decided instance.
    #[instrument(skip(self))]
    pub fn process_decision(&self, xt_id: XtId, decided: bool) -> ScpSupervisorResult<()> {
        self.try_finalize(xt_id, decided, FinalizeSource::ForceAbort);
        Ok(())
    }

    /// `tryFinalize`: reads the runner's decision state; if pending, returns.
    /// Otherwise runs the once-guarded cleanup exactly once.
    fn try_finalize(&self, xt_id: XtId, decided: bool, source: FinalizeSource) {
        Inner::finalize(&self.inner, xt_id, decided, source);
    }

    /// Every active instance's `XtId`s, for diagnostics/tests.
    pub fn active_ids(&self) -> Vec<XtId> {
        self.inner.active.lock().keys().copied().collect()
    }

    /// A read-only copy of the finalize history.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// Stop all timers and best-effort finalize every active instance by
    /// forcing a timeout.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let ids: Vec<XtId> = self.inner.active.lock().keys().copied().collect();
        for xt_id in ids {
            self.process_decision(xt_id, false).ok();
        }
    }
}

impl Inner {
    /// The once-guarded cleanup shared by vote/timeout/force-abort paths:
    /// cancel the timer, remove from active, append to (pruned) history,
    /// then invoke the finalize hook.
    fn finalize(inner: &Arc<Inner>, xt_id: XtId, decided: bool, source: FinalizeSource) {
        let removed = {
            let mut active = inner.active.lock();
            match active.remove(&xt_id) {
                Some(entry) => {
                    if entry.finalized.swap(true, Ordering::SeqCst) {
                        // Already finalized by a racing caller; put it back
                        // untouched so a second remove is harmless, and bail.
                        active.insert(xt_id, entry);
                        return;
                    }
                    Some(entry)
                }
                None => None,
            }
        };

        let Some(mut entry) = removed else { return };
        entry.timer.abort();

        let mut instance = entry.instance;
        let finalized_at = (inner.now_ms)();
        instance.decision = Some(decided);
        instance.decision_time_ms = Some(finalized_at);

        {
            let mut history = inner.history.lock();
            history.push_back(HistoryEntry {
                instance: instance.clone(),
                accepted: decided,
                source,
                started_at_ms: instance.start_time_ms,
                finalized_at_ms: finalized_at,
            });
            while history.len() > inner.max_history
                || history
                    .front()
                    .map(|e| finalized_at.saturating_sub(e.finalized_at_ms) > inner.history_retention.as_millis() as u64)
                    .unwrap_or(false)
            {
                history.pop_front();
            }
        }

        (inner.hook)(&instance);
    }
}

#[async_trait]
impl ConsensusCoordinator for ScpSupervisor {
    async fn start_transaction(
        &self,
        slot: u64,
        sequence_number: u64,
        request: QueuedXtRequest,
        xt_id: XtId,
        participating_chains: Vec<ChainId>,
    ) -> anyhow::Result<()> {
        self.start_instance(slot, sequence_number, request, xt_id, participating_chains)
            .map_err(|e| {
                warn!(error = %e, "start_transaction failed");
                anyhow::anyhow!(e)
            })
    }

    async fn handle_vote(&self, xt_id: XtId, chain_id: ChainId, vote: bool) -> anyhow::Result<()> {
        self.handle_vote(xt_id, chain_id, vote).map_err(Into::into)
    }

    async fn get_state(&self, xt_id: XtId) -> anyhow::Result<Option<DecisionState>> {
        Ok(self
            .inner
            .active
            .lock()
            .get(&xt_id)
            .map(|entry| entry.runner.decision_state()))
    }

    async fn process_scp_decision(&self, xt_id: XtId, decided: bool) -> anyhow::Result<()> {
        self.process_decision(xt_id, decided).map_err(Into::into)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        ScpSupervisor::stop(self).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration as StdDuration;

    fn chain(n: u8) -> ChainId {
        ChainId::new(vec![n])
    }

    fn req(chains: Vec<ChainId>) -> (QueuedXtRequest, XtId) {
        let xt_request = sp_types::xt::XtRequest::new(
            chains.into_iter().map(|c| (c, vec![vec![1]])).collect(),
        );
        let xt_id = xt_request.xt_id();
        (
            QueuedXtRequest {
                request: xt_request,
                submitted_at_ms: 0,
                expires_at_ms: u64::MAX,
                priority: 0,
                attempt_count: 0,
                source_id: "test".into(),
            },
            xt_id,
        )
    }

    fn supervisor(hook: FinalizeHook) -> ScpSupervisor {
        ScpSupervisor::new(StdDuration::from_secs(30), 1000, StdDuration::from_secs(3600), hook, || 0)
    }

    #[tokio::test]
    async fn duplicate_start_fails_and_still_finalizes_once() {
        let finalized_count = Arc::new(AtomicU64::new(0));
        let counter = finalized_count.clone();
        let sup = supervisor(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let (request, xt_id) = req(vec![chain(1), chain(2)]);
        sup.start_instance(100, 0, request.clone(), xt_id, vec![chain(1), chain(2)])
            .unwrap();
        let err = sup
            .start_instance(100, 1, request, xt_id, vec![chain(1), chain(2)])
            .unwrap_err();
        assert!(matches!(err, ScpSupervisorError::AlreadyActive(_)));
        // One finalize for the duplicate's rejected registration attempt.
        assert_eq!(finalized_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn vote_to_acceptance_finalizes_exactly_once() {
        let finalized: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = finalized.clone();
        let sup = supervisor(Arc::new(move |i: &ScpInstance| {
            sink.lock().push(i.decision.unwrap());
        }));

        let (request, xt_id) = req(vec![chain(1), chain(2)]);
        sup.start_instance(100, 0, request, xt_id, vec![chain(1), chain(2)])
            .unwrap();

        sup.handle_vote(xt_id, chain(2), true).unwrap();
        // Second vote after decision must not re-trigger finalize.
        sup.handle_vote(xt_id, chain(2), false).ok();

        assert_eq!(finalized.lock().clone(), vec![true]);
        assert!(sup.active_ids().is_empty());
    }

    #[tokio::test]
    async fn force_abort_decides_false() {
        let finalized: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = finalized.clone();
        let sup = supervisor(Arc::new(move |i: &ScpInstance| {
            sink.lock().push(i.decision.unwrap());
        }));

        let (request, xt_id) = req(vec![chain(1), chain(2)]);
        sup.start_instance(100, 0, request, xt_id, vec![chain(1), chain(2)])
            .unwrap();
        sup.process_decision(xt_id, false).unwrap();
        assert_eq!(finalized.lock().clone(), vec![false]);
    }
}
