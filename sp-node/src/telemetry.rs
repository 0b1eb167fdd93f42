// Copyright (c) 2018-2025 The Botho Foundation

//! Tracing subscriber setup, following `botho::telemetry`'s console-logging
//! half (the OTLP export half is not carried: this binary has no collector
//! to export to).

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `verbose` raises the default
/// level to `debug` when `RUST_LOG` is unset.
pub fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
