// Copyright (c) 2018-2025 The Botho Foundation

//! Error types shared across the data model.

use thiserror::Error;

/// Errors that can occur constructing or validating core types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Validation error: {0}
    #[error("Validation error: {0}")]
    Validation(String),

    /// Arithmetic overflow: {0}
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Serialization error: {0}
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type used throughout `sp-types`.
pub type TypesResult<T> = Result<T, TypesError>;
