// Copyright (c) 2018-2025 The Botho Foundation

//! The `Coordinator`: owns the slot tick loop, the XT consensus supervisor,
//! superblock assembly/hashing/persistence, and the L1 submission/inbound
//! loops (spec.md §4.4-§4.7, §5).
//!
//! Grounded on `bridge/service/src/engine.rs`'s `BridgeEngine` (spawn N
//! long-lived loops, join on shutdown) generalized from a fixed two-watcher
//! shape to the five loops spec.md §5 names, and on
//! `consensus/service.rs`'s per-subsystem `Arc<RwLock<_>>` ownership split
//! (current execution vs. history vs. tracked-tx each behind their own lock,
//! per spec.md §5 "Locking discipline").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};

use sp_proof_pipeline::ProofPipeline;
use sp_state_machine::SlotStateMachine;
use sp_types::hashing::ZERO_HASH;
use sp_types::ids::ChainId;
use sp_types::l2_block::L2Block;
use sp_types::messages::Message;
use sp_types::ports::{
    L1Publisher, L1SuperblockEvent, L1TransactionStatus, L2BlockStore, Registry, SlotManager,
    SuperblockStore, Transport, Wal, XtRequestQueue,
};
use sp_types::slot_execution::{Phase, SlotExecution};
use sp_types::superblock::{Superblock, SuperblockStatus};
use sp_types::wal::{WalEntry, WalEntryKind};
use sp_wal::HistoryRing;
use sp_xt_scp::{FinalizeHook, ScpSupervisor};

use crate::error::{CoordinatorError, CoordinatorResult};

/// Wall-clock milliseconds since the Unix epoch, the coordinator's only
/// source of "now" (everything else, including the slot clock, is injected).
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn phase_code(phase: Phase) -> i64 {
    match phase {
        Phase::Starting => 0,
        Phase::Free => 1,
        Phase::Locked => 2,
        Phase::Sealing => 3,
    }
}

/// Stand-in proof for the disabled-pipeline publish path. §4.5's submission
/// contract requires a non-empty proof even when no pipeline is configured
/// (spec.md §9 Open Question, resolved in DESIGN.md).
const NO_PROOF_SENTINEL: [u8; 1] = [0u8];

/// Timing and bounds the coordinator's loops and history run under.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub tick_interval: Duration,
    pub queue_sweep_interval: Duration,
    pub metrics_interval: Duration,
    pub l1_event_poll_interval: Duration,
    pub receipt_poll_interval: Duration,
    pub instance_timeout: Duration,
    pub max_history: usize,
    pub history_retention: Duration,
    /// Hard floor on how many superblock numbers `find_last_valid_superblock`
    /// will walk backwards before giving up (spec.md §9 "a configured floor
    /// to avoid scanning to genesis on pathological input").
    pub max_rollback_scan_depth: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            queue_sweep_interval: Duration::from_secs(1),
            metrics_interval: Duration::from_secs(5),
            l1_event_poll_interval: Duration::from_secs(2),
            receipt_poll_interval: Duration::from_secs(10),
            instance_timeout: Duration::from_secs(30),
            max_history: sp_wal::history::DEFAULT_MAX_ENTRIES,
            history_retention: Duration::from_secs(3600),
            max_rollback_scan_depth: 1000,
        }
    }
}

/// The infrastructure ports a `Coordinator` is wired against. Bundled into
/// one struct so `Coordinator::new` doesn't take ten positional arguments.
pub struct CoordinatorDeps {
    pub slot_manager: Arc<dyn SlotManager>,
    pub superblock_store: Arc<dyn SuperblockStore>,
    pub l2_block_store: Arc<dyn L2BlockStore>,
    pub queue: Arc<dyn XtRequestQueue>,
    pub registry: Arc<dyn Registry>,
    pub wal: Arc<dyn Wal>,
    pub transport: Arc<dyn Transport>,
    pub l1: Arc<dyn L1Publisher>,
    pub proof_pipeline: Arc<dyn ProofPipeline>,
}

pub struct Coordinator {
    pub(crate) slot_manager: Arc<dyn SlotManager>,
    pub(crate) state_machine: Arc<SlotStateMachine>,
    pub(crate) consensus: ScpSupervisor,
    pub(crate) superblock_store: Arc<dyn SuperblockStore>,
    pub(crate) l2_block_store: Arc<dyn L2BlockStore>,
    pub(crate) queue: Arc<dyn XtRequestQueue>,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) wal: Arc<dyn Wal>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) l1: Arc<dyn L1Publisher>,
    pub(crate) proof_pipeline: Arc<dyn ProofPipeline>,
    pub(crate) history: Arc<HistoryRing>,
    pub(crate) tracked_tx: Mutex<HashMap<u64, [u8; 32]>>,
    pub(crate) config: CoordinatorConfig,
    pub(crate) cancel: CancellationToken,
}

impl Coordinator {
    /// Build a coordinator. The returned value is already `Arc`-wrapped
    /// since its background loops (spawned by [`Coordinator::run`]) each
    /// hold a clone.
    pub fn new(deps: CoordinatorDeps, config: CoordinatorConfig) -> Arc<Self> {
        let state_machine = Arc::new(SlotStateMachine::new());
        let (decided_tx, decided_rx) = mpsc::unbounded_channel::<Message>();

        let hook_state_machine = state_machine.clone();
        let hook: FinalizeHook = Arc::new(move |instance| {
            let decision = instance.decision.unwrap_or(false);
            if decision {
                sp_metrics::SCP_ACCEPTED.inc();
            } else {
                sp_metrics::SCP_REJECTED.inc();
            }
            // Broadcast is enqueued before the state-machine update for the
            // same XtID (spec.md §5 "Ordering guarantees"); the actual wire
            // send happens asynchronously on the decision-relay task below.
            let _ = decided_tx.send(Message::Decided {
                xt_id: instance.xt_id,
                decision,
            });
            hook_state_machine
                .process_scp_decision(instance.xt_id, decision, now_ms())
                .ok();
        });

        let consensus = ScpSupervisor::new(
            config.instance_timeout,
            config.max_history,
            config.history_retention,
            hook,
            now_ms,
        );

        let coordinator = Arc::new(Self {
            slot_manager: deps.slot_manager,
            state_machine,
            consensus,
            superblock_store: deps.superblock_store,
            l2_block_store: deps.l2_block_store,
            queue: deps.queue,
            registry: deps.registry,
            wal: deps.wal,
            transport: deps.transport,
            l1: deps.l1,
            proof_pipeline: deps.proof_pipeline,
            history: Arc::new(HistoryRing::new(config.max_history)),
            tracked_tx: Mutex::new(HashMap::new()),
            config,
            cancel: CancellationToken::new(),
        });

        coordinator.clone().spawn_decision_relay(decided_rx);
        coordinator
    }

    /// Restore from the WAL's last snapshot, if any (spec.md §8 scenario
    /// S6). Installs the snapshot verbatim, including any in-flight SCP
    /// instances, received L2 blocks and attempted requests it recorded.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> CoordinatorResult<()> {
        let entries = self.wal.read_entries(0).await.map_err(CoordinatorError::persistence)?;
        let Some(last_snapshot) = entries
            .into_iter()
            .filter(|e| e.kind == WalEntryKind::SlotSnapshot)
            .last()
        else {
            return Ok(());
        };

        let execution: SlotExecution =
            bincode::deserialize(&last_snapshot.data).map_err(CoordinatorError::validation)?;
        self.history.push(execution.clone());
        self.state_machine.install_snapshot(execution);
        Ok(())
    }

    /// Run until [`Coordinator::stop`] is called, driving the five spec.md
    /// §5 loops (the proof pipeline's loop, if any, is internal to the
    /// injected `ProofPipeline` implementation and is not spawned here).
    pub async fn run(self: Arc<Self>) {
        let slot = {
            let this = self.clone();
            tokio::spawn(async move { this.run_slot_loop().await })
        };
        let queue = {
            let this = self.clone();
            tokio::spawn(async move { this.run_queue_loop().await })
        };
        let metrics = {
            let this = self.clone();
            tokio::spawn(async move { this.run_metrics_loop().await })
        };
        let l1_events = {
            let this = self.clone();
            tokio::spawn(async move { this.run_l1_event_loop().await })
        };
        let l1_receipts = {
            let this = self.clone();
            tokio::spawn(async move { this.run_l1_receipt_loop().await })
        };

        let _ = tokio::join!(slot, queue, metrics, l1_events, l1_receipts);
    }

    /// Cancel every loop, best-effort finalize every in-flight SCP instance,
    /// and close the WAL.
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.cancel.cancel();
        self.consensus.stop().await;
        self.wal.close().await
    }

    fn spawn_decision_relay(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Message>) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    message = rx.recv() => {
                        match message {
                            Some(message) => {
                                if let Err(e) = self.transport.broadcast(message, None).await {
                                    warn!(error = %e, "decision broadcast failed");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });
    }

    async fn run_slot_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "tick failed");
                    }
                }
            }
        }
    }

    async fn run_queue_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.queue_sweep_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.queue.remove_expired(now_ms()).await {
                        warn!(error = %e, "expired-queue sweep failed");
                    }
                }
            }
        }
    }

    async fn run_metrics_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.metrics_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    sp_metrics::CUR_SLOT.set(self.slot_manager.get_current_slot() as i64);
                    sp_metrics::CUR_PHASE.set(phase_code(self.state_machine.current_phase()));
                }
            }
        }
    }

    async fn run_l1_event_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.l1_event_poll_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.l1.watch_superblocks().await {
                        Ok(events) => {
                            for event in events {
                                if let Err(e) = self.handle_l1_event(event).await {
                                    error!(error = %e, "l1 event handling failed");
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "l1 event poll failed (transient)"),
                    }
                }
            }
        }
    }

    async fn run_l1_receipt_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.receipt_poll_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => self.poll_receipts().await,
            }
        }
    }

    /// Run one iteration of the slot-loop dispatch (spec.md §4.4): read the
    /// current phase and perform whatever that phase requires. Public so
    /// integration tests can drive the coordinator deterministically instead
    /// of racing the wall clock via [`Coordinator::run`].
    #[instrument(skip(self))]
    pub async fn tick(&self) -> CoordinatorResult<()> {
        let _timer = sp_metrics::TICK_DURATION.start_timer();
        sp_metrics::CUR_SLOT.set(self.slot_manager.get_current_slot() as i64);
        let phase = self.state_machine.current_phase();
        sp_metrics::CUR_PHASE.set(phase_code(phase));

        match phase {
            Phase::Starting => self.handle_starting().await,
            Phase::Free => self.handle_free().await,
            Phase::Locked => self.handle_locked().await,
            Phase::Sealing => self.handle_sealing().await,
        }
    }

    async fn handle_starting(&self) -> CoordinatorResult<()> {
        let slot = self.slot_manager.get_current_slot();
        let last_valid = self.find_last_valid_superblock().await?;
        let (next_number, last_hash) = match &last_valid {
            Some(sb) => (sb.number + 1, sb.hash),
            None => (1, ZERO_HASH),
        };

        let rollups = self
            .registry
            .get_active_rollups()
            .await
            .map_err(CoordinatorError::persistence)?;
        let active: Vec<ChainId> = rollups.into_iter().map(|r| r.chain_id).collect();
        for chain_id in &active {
            if let Some(block) = self
                .l2_block_store
                .get_latest_l2_block(chain_id)
                .await
                .map_err(CoordinatorError::persistence)?
            {
                self.state_machine
                    .seed_last_head(chain_id.clone(), block.block_number, block.block_hash);
            }
        }

        self.state_machine.begin_slot(slot, next_number, last_hash, active, now_ms())?;
        let snapshot = self.persist_snapshot().await?;
        self.transport
            .broadcast(
                Message::StartSlot {
                    slot,
                    next_superblock_number: next_number,
                    last_superblock_hash: last_hash,
                    l2_block_requests: snapshot.l2_block_requests.values().cloned().collect(),
                },
                None,
            )
            .await
            .map_err(CoordinatorError::transport)
    }

    async fn handle_free(&self) -> CoordinatorResult<()> {
        if self.slot_manager.is_slot_seal_time() {
            return self.request_seal().await;
        }
        let Some(head) = self.queue.peek().await.map_err(CoordinatorError::persistence)? else {
            return Ok(());
        };
        if head.is_expired(now_ms()) {
            self.queue.dequeue().await.map_err(CoordinatorError::persistence)?;
            return Ok(());
        }
        self.start_scp().await
    }

    async fn handle_locked(&self) -> CoordinatorResult<()> {
        if self.slot_manager.is_slot_seal_time() {
            self.request_seal().await
        } else {
            Ok(())
        }
    }

    async fn handle_sealing(&self) -> CoordinatorResult<()> {
        if self.state_machine.check_all_l2_blocks_received() {
            self.build_superblock().await
        } else if self.slot_manager.get_current_slot() > self.state_machine.current_slot() {
            self.handle_slot_timeout().await
        } else {
            Ok(())
        }
    }

    async fn start_scp(&self) -> CoordinatorResult<()> {
        let Some(queued) = self.queue.dequeue().await.map_err(CoordinatorError::persistence)? else {
            return Ok(());
        };
        let xt_id = queued.xt_id();
        let participating = queued.request.participating_chains();
        let slot = self.state_machine.current_slot();

        let instance =
            self.state_machine
                .start_scp(xt_id, queued.request.clone(), participating.clone(), now_ms())?;
        self.state_machine.record_attempted(queued.clone());
        sp_metrics::SCP_STARTED.inc();

        self.consensus
            .start_instance(slot, instance.sequence_number, queued.clone(), xt_id, participating)?;

        self.persist_snapshot().await?;
        self.transport
            .broadcast(
                Message::StartSc {
                    slot,
                    xt_sequence_number: instance.sequence_number,
                    xt_request: queued.request,
                    xt_id,
                },
                None,
            )
            .await
            .map_err(CoordinatorError::transport)
    }

    async fn request_seal(&self) -> CoordinatorResult<()> {
        self.force_abort_undecided();
        let snapshot = self.state_machine.snapshot();
        let included = snapshot.accepted_xt_ids();
        let slot = snapshot.slot;
        self.state_machine.request_seal(included.clone())?;
        self.persist_snapshot().await?;
        self.transport
            .broadcast(Message::RequestSeal { slot, included_xts: included }, None)
            .await
            .map_err(CoordinatorError::transport)
    }

    /// For every instance with `decision == None`, force a `false` decision.
    /// The finalize hook (see `Coordinator::new`) enqueues the `Decided`
    /// broadcast and applies the state-machine update uniformly for every
    /// finalize source, so this only needs to drive the consensus side.
    fn force_abort_undecided(&self) {
        let snapshot = self.state_machine.snapshot();
        for instance in snapshot.undecided_instances() {
            if let Err(e) = self.consensus.process_decision(instance.xt_id, false) {
                warn!(error = %e, xt_id = %instance.xt_id, "force-abort failed");
            }
        }
    }

    fn validate_l2_blocks(&self, snapshot: &SlotExecution) -> CoordinatorResult<()> {
        for block in snapshot.received_l2_blocks.values() {
            let request = snapshot
                .l2_block_requests
                .get(&block.chain_id)
                .ok_or_else(|| CoordinatorError::Validation(format!("block for unrequested chain {}", block.chain_id)))?;
            if !request.accepts(block, snapshot.slot) {
                return Err(CoordinatorError::Validation(format!(
                    "block {} for chain {} fails acceptance at slot {}",
                    block.block_number, block.chain_id, snapshot.slot
                )));
            }
        }
        Ok(())
    }

    async fn build_superblock(&self) -> CoordinatorResult<()> {
        let snapshot = self.state_machine.snapshot();
        self.validate_l2_blocks(&snapshot)?;
        self.assemble_and_publish(&snapshot).await
    }

    async fn handle_slot_timeout(&self) -> CoordinatorResult<()> {
        let snapshot = self.state_machine.snapshot();
        if self.can_build_partial(&snapshot) {
            self.assemble_and_publish(&snapshot).await
        } else {
            self.fail_slot(&snapshot, "slot timeout: an accepted SCP has no participating chain block")
                .await
        }
    }

    fn can_build_partial(&self, snapshot: &SlotExecution) -> bool {
        if self.validate_l2_blocks(snapshot).is_err() {
            return false;
        }
        snapshot
            .scp_instances
            .values()
            .filter(|instance| instance.decision == Some(true))
            .all(|instance| {
                instance
                    .participating_chains
                    .iter()
                    .any(|chain| snapshot.received_l2_blocks.contains_key(chain))
            })
    }

    async fn assemble_and_publish(&self, snapshot: &SlotExecution) -> CoordinatorResult<()> {
        let blocks: Vec<L2Block> = snapshot.received_l2_blocks.values().cloned().collect();
        let included_xts = snapshot.included_xts.clone().unwrap_or_default();
        let superblock = Superblock::new(
            snapshot.next_superblock_number,
            snapshot.slot,
            snapshot.last_superblock_hash,
            now_ms(),
            blocks,
            included_xts,
        );

        self.superblock_store
            .store_superblock(&superblock)
            .await
            .map_err(CoordinatorError::persistence)?;
        sp_metrics::SUPERBLOCKS_BUILT.inc();

        // Preserve the completed execution (its `attempted_requests` in
        // particular) under this slot's history entry before `finish_slot`
        // blanks it back to `Starting` at the same slot number; a rollback
        // arriving later for this slot must still find these requests.
        self.history.push(snapshot.clone());
        self.state_machine
            .finish_slot(snapshot.slot, superblock.number + 1, superblock.hash);
        self.write_wal_snapshot(&self.state_machine.snapshot()).await?;

        if self.proof_pipeline.requires_proof() {
            self.proof_pipeline
                .enqueue(superblock)
                .await
                .map_err(CoordinatorError::validation)?;
            // Deferred: the pipeline drives the eventual L1 publish through
            // its injected callback once proof bytes arrive (spec.md §9
            // "Proof-gated publish").
        } else {
            self.proof_pipeline.enqueue(superblock.clone()).await.ok();
            self.publish_superblock(superblock, &NO_PROOF_SENTINEL).await?;
        }
        Ok(())
    }

    async fn fail_slot(&self, snapshot: &SlotExecution, reason: &str) -> CoordinatorResult<()> {
        sp_metrics::SLOTS_FAILED.inc();
        warn!(slot = snapshot.slot, reason, "slot failed, requeueing attempted XTs");
        for request in &snapshot.attempted_requests {
            if let Err(e) = self.queue.requeue_for_slot(request.clone()).await {
                warn!(error = %e, "failed to requeue attempted request after slot failure");
            }
        }
        // Same history-preservation concern as `assemble_and_publish`: keep
        // this slot's real execution in history before blanking it.
        self.history.push(snapshot.clone());
        self.state_machine
            .finish_slot(snapshot.slot, snapshot.next_superblock_number, snapshot.last_superblock_hash);
        self.write_wal_snapshot(&self.state_machine.snapshot()).await?;
        Ok(())
    }

    /// Submit `superblock` to L1 with `proof`. Public so the proof
    /// pipeline's completion callback (constructed by the binary wiring the
    /// coordinator together) can drive the deferred publish path.
    pub async fn publish_superblock(&self, mut superblock: Superblock, proof: &[u8]) -> CoordinatorResult<()> {
        let tx_hash = self
            .l1
            .publish_superblock_with_proof(&superblock, proof)
            .await
            .map_err(CoordinatorError::l1_transient)?;

        superblock.status = SuperblockStatus::Submitted;
        superblock.l1_transaction_hash = Some(tx_hash);
        self.tracked_tx.lock().insert(superblock.number, tx_hash);
        sp_metrics::L1_SUBMISSIONS.inc();

        if let Err(e) = self.superblock_store.store_superblock(&superblock).await {
            warn!(error = %e, superblock_number = superblock.number, "post-publish persist failed, tx remains tracked");
        }
        Ok(())
    }

    async fn handle_l1_event(&self, event: L1SuperblockEvent) -> CoordinatorResult<()> {
        match event {
            L1SuperblockEvent::Proposed { superblock_number } => {
                let Some(mut sb) = self
                    .superblock_store
                    .get_superblock(superblock_number)
                    .await
                    .map_err(CoordinatorError::persistence)?
                else {
                    return Ok(());
                };
                if sb.status == SuperblockStatus::Pending {
                    sb.status = SuperblockStatus::Submitted;
                    self.superblock_store
                        .store_superblock(&sb)
                        .await
                        .map_err(CoordinatorError::persistence)?;
                }
                Ok(())
            }
            L1SuperblockEvent::RolledBack { superblock_number } => {
                let Some(mut sb) = self
                    .superblock_store
                    .get_superblock(superblock_number)
                    .await
                    .map_err(CoordinatorError::persistence)?
                else {
                    return Ok(());
                };
                sb.status = SuperblockStatus::RolledBack;
                self.superblock_store
                    .store_superblock(&sb)
                    .await
                    .map_err(CoordinatorError::persistence)?;
                self.tracked_tx.lock().remove(&superblock_number);
                sp_metrics::L1_ROLLBACKS.inc();
                self.handle_rollback(superblock_number).await
            }
        }
    }

    /// Run one iteration of receipt polling for every tracked superblock.
    /// Public for the same reason as [`Coordinator::tick`]: deterministic
    /// integration-test driving instead of racing `receipt_poll_interval`.
    pub async fn poll_receipts_once(&self) {
        self.poll_receipts().await;
    }

    async fn poll_receipts(&self) {
        let tracked: Vec<(u64, [u8; 32])> = self.tracked_tx.lock().iter().map(|(n, h)| (*n, *h)).collect();
        for (number, tx_hash) in tracked {
            match self.l1.get_publish_status(tx_hash).await {
                Ok(status) => {
                    if let Err(e) = self.apply_receipt_status(number, status).await {
                        warn!(error = %e, superblock_number = number, "applying receipt status failed");
                    }
                }
                Err(e) => warn!(error = %e, superblock_number = number, "receipt poll failed (transient)"),
            }
        }
    }

    async fn apply_receipt_status(&self, number: u64, status: L1TransactionStatus) -> CoordinatorResult<()> {
        let Some(mut sb) = self
            .superblock_store
            .get_superblock(number)
            .await
            .map_err(CoordinatorError::persistence)?
        else {
            return Ok(());
        };
        match status {
            L1TransactionStatus::Finalized => {
                sb.status = SuperblockStatus::Finalized;
                self.tracked_tx.lock().remove(&number);
            }
            L1TransactionStatus::Confirmed => sb.status = SuperblockStatus::Confirmed,
            L1TransactionStatus::Included => {
                if sb.status == SuperblockStatus::Pending {
                    sb.status = SuperblockStatus::Submitted;
                }
            }
            L1TransactionStatus::Failed => {
                sb.status = SuperblockStatus::Pending;
                self.tracked_tx.lock().remove(&number);
            }
            L1TransactionStatus::Pending => return Ok(()),
        }
        self.superblock_store
            .store_superblock(&sb)
            .await
            .map_err(CoordinatorError::persistence)
    }

    pub(crate) async fn find_last_valid_superblock(&self) -> CoordinatorResult<Option<Superblock>> {
        let mut current = self
            .superblock_store
            .get_latest_superblock()
            .await
            .map_err(CoordinatorError::persistence)?;
        let mut scanned = 0u64;
        while let Some(sb) = current.clone() {
            if sb.status != SuperblockStatus::RolledBack {
                return Ok(Some(sb));
            }
            scanned += 1;
            if scanned >= self.config.max_rollback_scan_depth || sb.number <= 1 {
                return Ok(None);
            }
            current = self
                .superblock_store
                .get_superblock(sb.number - 1)
                .await
                .map_err(CoordinatorError::persistence)?;
        }
        Ok(None)
    }

    pub(crate) async fn persist_snapshot(&self) -> CoordinatorResult<SlotExecution> {
        let snapshot = self.state_machine.snapshot();
        self.history.push(snapshot.clone());
        self.write_wal_snapshot(&snapshot).await?;
        Ok(snapshot)
    }

    /// Write `execution` to the WAL without touching `history`. Used right
    /// after `finish_slot`/`fail_slot` blank the live execution back to
    /// `Starting` at the just-completed slot number: the WAL still needs the
    /// blanked state for recovery, but `history` must keep holding the
    /// populated snapshot recorded just before the blanking, not have it
    /// overwritten by the blank one under the same slot key.
    async fn write_wal_snapshot(&self, execution: &SlotExecution) -> CoordinatorResult<()> {
        let data = bincode::serialize(execution).map_err(CoordinatorError::validation)?;
        self.wal
            .write_entry(WalEntry {
                sequence: 0,
                slot: execution.slot,
                kind: WalEntryKind::SlotSnapshot,
                data,
                timestamp_ms: now_ms(),
            })
            .await
            .map_err(CoordinatorError::persistence)
    }

    /// Route an externally-observed vote to the consensus supervisor. Not
    /// one of the five tick-loop paths; called from whatever network layer
    /// receives `Vote` messages from peer publishers (spec.md §6).
    pub fn handle_vote(&self, xt_id: sp_types::ids::XtId, chain_id: ChainId, vote: bool) -> CoordinatorResult<()> {
        self.consensus.handle_vote(xt_id, chain_id, vote).map_err(Into::into)
    }

    /// Hand an L2 block submitted by a rollup to the state machine. Not one
    /// of the five tick-loop paths; called from whatever network layer
    /// receives blocks from rollup sequencers during `Sealing` (spec.md
    /// §4.4 "Sealing handler"). Accepted blocks are persisted to the L2
    /// block store so the next `Starting` handler (and the rollback
    /// handler's fallback path) can derive future requests from them.
    pub async fn receive_l2_block(&self, block: L2Block) -> CoordinatorResult<bool> {
        let accepted = self.state_machine.receive_l2_block(block.clone())?;
        if accepted {
            self.l2_block_store
                .store_l2_block(&block)
                .await
                .map_err(CoordinatorError::persistence)?;
        }
        Ok(accepted)
    }
}
