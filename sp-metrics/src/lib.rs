// Copyright (c) 2018-2025 The Botho Foundation

//! Prometheus metrics for the coordinator (spec.md §5 "Metrics updater").
//!
//! Grounded on `consensus/service/src/counters.rs`'s
//! `OpMetrics`/`LazyLock`-backed static gauges/counters, reusing the
//! teacher's `prometheus` dependency directly rather than its internal
//! `mc_util_metrics` wrapper crate (out of scope to carry over for a single
//! small helper).

use std::sync::LazyLock;

use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};

/// Current slot number the coordinator is processing.
pub static CUR_SLOT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("sp_coordinator_current_slot", "Current slot number").unwrap()
});

/// Current slot automaton phase, encoded 0=Starting, 1=Free, 2=Locked, 3=Sealing.
pub static CUR_PHASE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "sp_coordinator_current_phase",
        "Current slot phase (0=Starting,1=Free,2=Locked,3=Sealing)"
    )
    .unwrap()
});

/// Superblocks successfully built.
pub static SUPERBLOCKS_BUILT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_coordinator_superblocks_built_total", "Superblocks built").unwrap()
});

/// Slots that failed to produce a superblock.
pub static SLOTS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_coordinator_slots_failed_total", "Slots that failed to build a superblock")
        .unwrap()
});

/// SCP instances started.
pub static SCP_STARTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_xt_scp_instances_started_total", "SCP instances started").unwrap()
});

/// SCP instances decided accepted.
pub static SCP_ACCEPTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_xt_scp_instances_accepted_total", "SCP instances decided accepted").unwrap()
});

/// SCP instances decided rejected (vote or timeout or force-abort).
pub static SCP_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_xt_scp_instances_rejected_total", "SCP instances decided rejected").unwrap()
});

/// L1 rollback events observed.
pub static L1_ROLLBACKS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_l1_bridge_rollbacks_total", "L1 rollback events observed").unwrap()
});

/// L1 superblock submissions.
pub static L1_SUBMISSIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sp_l1_bridge_submissions_total", "Superblocks submitted to L1").unwrap()
});

/// Time spent inside one coordinator tick, in seconds.
pub static TICK_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "sp_coordinator_tick_duration_seconds",
        "Time spent inside one coordinator tick",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

/// Touch every metric once so they register and appear in `/metrics` output
/// even before the first observation, following the teacher's pattern of
/// registering all counters at process start.
pub fn init() {
    LazyLock::force(&CUR_SLOT);
    LazyLock::force(&CUR_PHASE);
    LazyLock::force(&SUPERBLOCKS_BUILT);
    LazyLock::force(&SLOTS_FAILED);
    LazyLock::force(&SCP_STARTED);
    LazyLock::force(&SCP_ACCEPTED);
    LazyLock::force(&SCP_REJECTED);
    LazyLock::force(&L1_ROLLBACKS);
    LazyLock::force(&L1_SUBMISSIONS);
    LazyLock::force(&TICK_DURATION);
}
