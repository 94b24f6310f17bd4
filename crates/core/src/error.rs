// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for lock handles

use crate::engine::LockKind;
use crate::lifecycle::LockState;
use thiserror::Error;

/// Invalid constructor arguments, reported before any authority is contacted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("\"key\" is required")]
    EmptyKey,
    #[error("\"limit\" must be at least 1")]
    ZeroLimit,
    #[error("\"lock_timeout\" must be greater than zero")]
    ZeroLockTimeout,
    #[error("\"identifier\" must not be empty")]
    EmptyIdentifier,
    #[error("\"identifier\" is required when the lock is acquired externally")]
    MissingExternalIdentifier,
    #[error("at least one authority is required")]
    NoAuthorities,
}

/// The lock could no longer be confirmed as held
///
/// Raised from the background refresh task: the record expired, was
/// overwritten by a third party, or a quorum of authorities stopped
/// confirming it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lost {kind} for key {key}")]
pub struct LostLockError {
    pub kind: LockKind,
    pub key: String,
    /// Transport error that prevented confirmation, if any
    pub cause: Option<String>,
}

/// Errors from lock handle operations
#[derive(Debug, Error)]
pub enum LockError {
    #[error("invalid lock: {0}")]
    Validation(#[from] ValidationError),
    #[error("Acquire {kind} {key} timeout")]
    AcquireTimeout { kind: LockKind, key: String },
    #[error(transparent)]
    Lost(#[from] LostLockError),
    #[error("{kind} {key} is not acquired")]
    NotAcquired { kind: LockKind, key: String },
    #[error("{kind} {key} is {state} and cannot be acquired again")]
    Terminal {
        kind: LockKind,
        key: String,
        state: LockState,
    },
    #[error("invalid lock options: {0}")]
    Config(#[from] toml::de::Error),
}
