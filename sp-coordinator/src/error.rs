// Copyright (c) 2018-2025 The Botho Foundation

//! `CoordinatorError`: wraps every sub-crate's typed error via `#[from]`,
//! plus the infrastructure-port failure taxonomy from spec.md §7
//! (Validation / NotFound / AlreadyActive / Transport / Persistence /
//! transient-L1 / Timeout).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    StateMachine(#[from] sp_state_machine::error::StateMachineError),

    #[error(transparent)]
    ScpSupervisor(#[from] sp_xt_scp::error::ScpSupervisorError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already active: {0}")]
    AlreadyActive(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("L1 transient error (retryable): {0}")]
    L1Transient(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rollback target superblock {0} not found")]
    RollbackTargetMissing(u64),
}

impl CoordinatorError {
    pub fn persistence(e: impl std::fmt::Display) -> Self {
        Self::Persistence(e.to_string())
    }

    pub fn transport(e: impl std::fmt::Display) -> Self {
        Self::Transport(e.to_string())
    }

    pub fn l1_transient(e: impl std::fmt::Display) -> Self {
        Self::L1Transient(e.to_string())
    }

    pub fn validation(e: impl std::fmt::Display) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
