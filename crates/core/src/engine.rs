// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock engines
//!
//! An engine performs single acquire/refresh/release attempts for one key.
//! It holds no per-holder state: the identifier and timing come from the
//! handle on every call. Retrying is layered on top by [`acquire_with_retry`].

use crate::clock::Clock;
use crate::options::LockOptions;
use async_trait::async_trait;
use dlock_adapters::AuthorityError;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Which flavor of lock a handle guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Mutex,
    Semaphore,
    RedlockMutex,
    RedlockSemaphore,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Mutex => "mutex",
            LockKind::Semaphore => "semaphore",
            LockKind::RedlockMutex => "redlock-mutex",
            LockKind::RedlockSemaphore => "redlock-semaphore",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-attempt lock protocol for one key
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    fn kind(&self) -> LockKind;

    fn key(&self) -> &str;

    /// One acquire attempt
    ///
    /// `deadline` bounds the whole attempt; engines that fan out use it to
    /// stop waiting on slow authorities.
    async fn try_acquire<C: Clock>(
        &self,
        identifier: &str,
        lock_timeout: Duration,
        deadline: Option<Instant>,
        clock: &C,
    ) -> Result<bool, AuthorityError>;

    /// Extend the hold; `false` means the lock is no longer held
    async fn refresh<C: Clock>(
        &self,
        identifier: &str,
        lock_timeout: Duration,
        clock: &C,
    ) -> Result<bool, AuthorityError>;

    async fn release(&self, identifier: &str) -> Result<bool, AuthorityError>;

    /// Assume a hold taken elsewhere, ahead of the first refresh
    fn attach(&self) {}
}

/// Attempt to acquire until success, the acquire timeout, or the attempt limit
///
/// Transport errors count as failed attempts.
pub async fn acquire_with_retry<E: Engine, C: Clock>(
    engine: &E,
    identifier: &str,
    options: &LockOptions,
    clock: &C,
) -> bool {
    let start = Instant::now();
    let deadline = start + options.acquire_timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        match engine
            .try_acquire(identifier, options.lock_timeout, Some(deadline), clock)
            .await
        {
            Ok(true) => return true,
            Ok(false) => tracing::debug!(
                kind = %engine.kind(),
                key = engine.key(),
                identifier,
                attempts,
                "acquire attempt refused"
            ),
            Err(e) => tracing::warn!(
                kind = %engine.kind(),
                key = engine.key(),
                identifier,
                attempts,
                error = %e,
                "acquire attempt failed"
            ),
        }

        let exhausted = options
            .acquire_attempts_limit
            .is_some_and(|limit| attempts >= limit);
        if exhausted || start.elapsed() >= options.acquire_timeout {
            return false;
        }
        tokio::time::sleep(options.retry_interval).await;
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
