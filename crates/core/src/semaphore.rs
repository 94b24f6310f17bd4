// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting semaphore over a single authority
//!
//! Holders are scored with the caller's clock. An entry whose score falls
//! more than `lock_timeout` behind the acquirer's clock is treated as expired
//! and pruned, so clocks across holders must agree within `lock_timeout`.

use crate::clock::{Clock, SystemClock};
use crate::engine::{Engine, LockKind};
use crate::error::{LockError, ValidationError};
use crate::lifecycle::Lock;
use crate::options::LockOptions;
use async_trait::async_trait;
use dlock_adapters::{Authority, AuthorityError};
use std::time::Duration;
use tokio::time::Instant;

/// Prefix applied to semaphore keys by the public constructors
pub const SEMAPHORE_PREFIX: &str = "semaphore:";

pub(crate) fn semaphore_key(key: impl Into<String>) -> Result<String, ValidationError> {
    let key = key.into();
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    Ok(format!("{SEMAPHORE_PREFIX}{key}"))
}

/// Bounded lock engine: at most `limit` identifiers hold `key`
#[derive(Clone)]
pub struct SemaphoreEngine<A: Authority> {
    authority: A,
    key: String,
    limit: u32,
}

impl<A: Authority> SemaphoreEngine<A> {
    /// `key` is used as given; see [`SEMAPHORE_PREFIX`] for the public form
    pub fn new(authority: A, key: impl Into<String>, limit: u32) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if limit == 0 {
            return Err(ValidationError::ZeroLimit);
        }
        Ok(Self {
            authority,
            key,
            limit,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }
}

#[async_trait]
impl<A: Authority> Engine for SemaphoreEngine<A> {
    fn kind(&self) -> LockKind {
        LockKind::Semaphore
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn try_acquire<C: Clock>(
        &self,
        identifier: &str,
        lock_timeout: Duration,
        _deadline: Option<Instant>,
        clock: &C,
    ) -> Result<bool, AuthorityError> {
        self.authority
            .acquire_semaphore(
                &self.key,
                self.limit,
                identifier,
                lock_timeout.as_millis() as u64,
                clock.now(),
            )
            .await
    }

    async fn refresh<C: Clock>(
        &self,
        identifier: &str,
        lock_timeout: Duration,
        clock: &C,
    ) -> Result<bool, AuthorityError> {
        self.authority
            .refresh_semaphore(
                &self.key,
                self.limit,
                identifier,
                lock_timeout.as_millis() as u64,
                clock.now(),
            )
            .await
    }

    async fn release(&self, identifier: &str) -> Result<bool, AuthorityError> {
        self.authority.release_semaphore(&self.key, identifier).await
    }
}

/// Distributed semaphore handle over one authority
pub type Semaphore<A, C = SystemClock> = Lock<SemaphoreEngine<A>, C>;

impl<A: Authority> Lock<SemaphoreEngine<A>, SystemClock> {
    /// Create a semaphore admitting `limit` holders of `key`
    pub fn new(
        authority: A,
        key: impl Into<String>,
        limit: u32,
        options: LockOptions,
    ) -> Result<Self, LockError> {
        Self::with_clock(authority, key, limit, options, SystemClock)
    }
}

impl<A: Authority, C: Clock> Lock<SemaphoreEngine<A>, C> {
    pub fn with_clock(
        authority: A,
        key: impl Into<String>,
        limit: u32,
        options: LockOptions,
        clock: C,
    ) -> Result<Self, LockError> {
        let engine = SemaphoreEngine::new(authority, semaphore_key(key)?, limit)?;
        Lock::from_engine(engine, options, clock)
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
