// Copyright (c) 2018-2025 The Botho Foundation

//! Errors for the slot state machine (spec.md §4.2).

use thiserror::Error;

/// Errors the slot state machine can return.
#[derive(Debug, Error)]
pub enum StateMachineError {
    /// A transition was attempted from a phase that does not support it.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// `StartSCP` was called with an `XtId` already active this slot.
    #[error("SCP instance for this XtId is already active in slot {0}")]
    AlreadyActive(u64),

    /// `ProcessSCPDecision` / `ReceiveL2Block` referenced something unknown.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for the slot state machine.
pub type StateMachineResult<T> = Result<T, StateMachineError>;
