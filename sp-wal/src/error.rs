// Copyright (c) 2018-2025 The Botho Foundation

//! Errors for the WAL and history ring.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt WAL entry at offset {0}: {1}")]
    Corrupt(u64, String),
}

impl From<std::io::Error> for WalError {
    fn from(err: std::io::Error) -> Self {
        WalError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for WalError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        WalError::Serialization(err.to_string())
    }
}

pub type WalResult<T> = Result<T, WalError>;
