// Copyright (c) 2018-2025 The Botho Foundation

//! Errors for the XT consensus supervisor (spec.md §4.3).

use thiserror::Error;

/// Errors the supervisor can return.
#[derive(Debug, Error)]
pub enum ScpSupervisorError {
    /// `StartInstance` was called with an `XtId` that already has an active
    /// instance this slot.
    #[error("SCP instance already active for xt_id {0}")]
    AlreadyActive(String),

    /// `HandleVote` referenced an `XtId` with no active instance.
    #[error("no active SCP instance for xt_id {0}")]
    NotFound(String),

    /// The underlying runner could not be constructed for this instance.
    #[error("failed to construct runner: {0}")]
    ConstructionFailed(String),
}

/// Result type for the XT consensus supervisor.
pub type ScpSupervisorResult<T> = Result<T, ScpSupervisorError>;
