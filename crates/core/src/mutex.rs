// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutex over a single authority

use crate::clock::{Clock, SystemClock};
use crate::engine::{Engine, LockKind};
use crate::error::{LockError, ValidationError};
use crate::lifecycle::Lock;
use crate::options::LockOptions;
use async_trait::async_trait;
use dlock_adapters::{Authority, AuthorityError};
use std::time::Duration;
use tokio::time::Instant;

/// Exclusive lock engine: at most one identifier holds `key`
#[derive(Clone)]
pub struct MutexEngine<A: Authority> {
    authority: A,
    key: String,
}

impl<A: Authority> MutexEngine<A> {
    pub fn new(authority: A, key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        Ok(Self { authority, key })
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }
}

#[async_trait]
impl<A: Authority> Engine for MutexEngine<A> {
    fn kind(&self) -> LockKind {
        LockKind::Mutex
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
            .acquire_mutex(
                &self.key,
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
        _clock: &C,
    ) -> Result<bool, AuthorityError> {
        self.authority
            .refresh_mutex(&self.key, identifier, lock_timeout.as_millis() as u64)
            .await
    }

    async fn release(&self, identifier: &str) -> Result<bool, AuthorityError> {
        self.authority.release_mutex(&self.key, identifier).await
    }
}

/// Distributed mutex handle over one authority
pub type Mutex<A, C = SystemClock> = Lock<MutexEngine<A>, C>;

impl<A: Authority> Lock<MutexEngine<A>, SystemClock> {
    /// Create a mutex on `key`; the key is used verbatim
    pub fn new(authority: A, key: impl Into<String>, options: LockOptions) -> Result<Self, LockError> {
        Self::with_clock(authority, key, options, SystemClock)
    }
}

impl<A: Authority, C: Clock> Lock<MutexEngine<A>, C> {
    pub fn with_clock(
        authority: A,
        key: impl Into<String>,
        options: LockOptions,
        clock: C,
    ) -> Result<Self, LockError> {
        let engine = MutexEngine::new(authority, key)?;
        Lock::from_engine(engine, options, clock)
    }
}

#[cfg(test)]
#[path = "mutex_tests.rs"]
mod tests;
