// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authority adapters
//!
//! An authority is one key-value store instance holding lock state. Every
//! operation here is a single round trip executed atomically by the
//! authority, so no intermediate state is ever observable by a competing
//! client.
//!
//! Timestamps (`now_ms`) are always supplied by the caller. Semaphore entries
//! are scored with the caller's clock, which keeps multi-authority
//! orchestration in control of clock divergence. The tolerated skew between
//! an acquirer and a refreshing holder is `lock_timeout_ms`: beyond that a
//! live entry can be pruned as expired by the acquirer.

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
mod scripts;

#[cfg(feature = "redis")]
pub use self::redis::RedisAuthority;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{AuthorityCall, FakeAuthority};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from authority operations
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("authority {0} is unreachable")]
    Unreachable(String),
    #[error("key {key} on authority {authority} holds the wrong kind of value")]
    WrongType { authority: String, key: String },
    #[error("unexpected reply from authority {authority}: {reply}")]
    UnexpectedReply { authority: String, reply: String },
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Atomic lock operations against a single authority
#[async_trait]
pub trait Authority: Clone + Send + Sync + 'static {
    /// Human-readable name used in logs and errors
    fn name(&self) -> &str;

    /// Bind `key` to `identifier` with a TTL iff the key is absent or expired
    async fn acquire_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError>;

    /// Extend the TTL of `key` iff it is bound to `identifier`
    async fn refresh_mutex(
        &self,
        key: &str,
        identifier: &str,
        lock_timeout_ms: u64,
    ) -> Result<bool, AuthorityError>;

    /// Delete `key` iff it is bound to `identifier`
    async fn release_mutex(&self, key: &str, identifier: &str) -> Result<bool, AuthorityError>;

    /// Prune expired entries, then take a slot iff fewer than `limit` remain
    async fn acquire_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError>;

    /// Prune expired entries, then renew `identifier`'s slot if it survived
    ///
    /// A renewed entry moves to the most-recently-renewed position.
    async fn refresh_semaphore(
        &self,
        key: &str,
        limit: u32,
        identifier: &str,
        lock_timeout_ms: u64,
        now_ms: u64,
    ) -> Result<bool, AuthorityError>;

    /// Remove `identifier`'s slot; true iff an entry was removed
    async fn release_semaphore(&self, key: &str, identifier: &str)
        -> Result<bool, AuthorityError>;
}
