// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quorum locks across independent authorities (Redlock)
//!
//! A [`Quorum`] fans every operation out to one engine per authority and
//! decides by strict majority. An acquire that misses the majority is rolled
//! back on every member that granted it or did not answer before the
//! deadline, so no partial hold is left behind.

use crate::clock::{Clock, SystemClock};
use crate::engine::{Engine, LockKind};
use crate::error::{LockError, ValidationError};
use crate::lifecycle::Lock;
use crate::mutex::MutexEngine;
use crate::options::LockOptions;
use crate::semaphore::{semaphore_key, SemaphoreEngine};
use async_trait::async_trait;
use dlock_adapters::{Authority, AuthorityError};
use futures::future::join_all;
use std::sync::MutexGuard;
use std::time::Duration;
use tokio::time::Instant;

/// Smallest number of successes that is a majority of `total`
pub fn majority(total: usize) -> usize {
    total / 2 + 1
}

/// Per-authority outcome of one fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumResult {
    outcomes: Vec<bool>,
}

impl QuorumResult {
    pub fn new(outcomes: Vec<bool>) -> Self {
        Self { outcomes }
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|ok| **ok).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn has_majority(&self) -> bool {
        self.total() > 0 && self.successes() >= majority(self.total())
    }

    /// Indexes of the authorities that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = usize> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, ok)| ok.then_some(i))
    }

    pub fn outcomes(&self) -> &[bool] {
        &self.outcomes
    }
}

#[derive(Debug)]
enum Outcome {
    Granted,
    Refused,
    Failed(AuthorityError),
    TimedOut,
}

impl Outcome {
    fn granted(&self) -> bool {
        matches!(self, Outcome::Granted)
    }

    /// The member may hold a record we must clean up
    fn needs_rollback(&self) -> bool {
        matches!(self, Outcome::Granted | Outcome::TimedOut)
    }
}

impl From<Result<bool, AuthorityError>> for Outcome {
    fn from(result: Result<bool, AuthorityError>) -> Self {
        match result {
            Ok(true) => Outcome::Granted,
            Ok(false) => Outcome::Refused,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Majority-of-N coordinator over per-authority engines
pub struct Quorum<E> {
    members: Vec<E>,
    kind: LockKind,
    key: String,
    /// Members believed to hold the lock
    held: std::sync::Mutex<Vec<bool>>,
}

impl<E: Engine> Quorum<E> {
    pub fn new(members: Vec<E>) -> Result<Self, ValidationError> {
        let first = members.first().ok_or(ValidationError::NoAuthorities)?;
        let kind = match first.kind() {
            LockKind::Mutex => LockKind::RedlockMutex,
            LockKind::Semaphore => LockKind::RedlockSemaphore,
            other => other,
        };
        let key = first.key().to_string();
        let held = std::sync::Mutex::new(vec![false; members.len()]);
        Ok(Self {
            members,
            kind,
            key,
            held,
        })
    }

    pub fn members(&self) -> &[E] {
        &self.members
    }

    /// Members currently believed to hold the lock
    pub fn held(&self) -> QuorumResult {
        QuorumResult::new(self.held_mask().clone())
    }

    fn held_mask(&self) -> MutexGuard<'_, Vec<bool>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn rollback(&self, identifier: &str, outcomes: &[Outcome]) {
        let releases = self
            .members
            .iter()
            .zip(outcomes)
            .enumerate()
            .filter(|(_, (_, outcome))| outcome.needs_rollback())
            .map(|(index, (member, _))| async move { (index, member.release(identifier).await) });

        for (index, result) in join_all(releases).await {
            if let Err(e) = result {
                tracing::warn!(
                    kind = %self.kind,
                    key = %self.key,
                    member = index,
                    error = %e,
                    "rollback release failed"
                );
            }
        }
    }
}

#[async_trait]
impl<E: Engine> Engine for Quorum<E> {
    fn kind(&self) -> LockKind {
        self.kind
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn try_acquire<C: Clock>(
        &self,
        identifier: &str,
        lock_timeout: Duration,
        deadline: Option<Instant>,
        clock: &C,
    ) -> Result<bool, AuthorityError> {
        let attempts = self.members.iter().map(|member| async move {
            let attempt = member.try_acquire(identifier, lock_timeout, deadline, clock);
            match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, attempt).await {
                    Ok(result) => Outcome::from(result),
                    Err(_) => Outcome::TimedOut,
                },
                None => Outcome::from(attempt.await),
            }
        });
        let outcomes = join_all(attempts).await;

        for (index, outcome) in outcomes.iter().enumerate() {
            match outcome {
                Outcome::Failed(e) => tracing::warn!(
                    kind = %self.kind,
                    key = %self.key,
                    member = index,
                    error = %e,
                    "member acquire failed"
                ),
                Outcome::TimedOut => tracing::warn!(
                    kind = %self.kind,
                    key = %self.key,
                    member = index,
                    "member acquire timed out"
                ),
                Outcome::Granted | Outcome::Refused => {}
            }
        }

        let result = QuorumResult::new(outcomes.iter().map(Outcome::granted).collect());
        if result.has_majority() {
            *self.held_mask() = result.outcomes().to_vec();
            return Ok(true);
        }

        tracing::warn!(
            kind = %self.kind,
            key = %self.key,
            identifier,
            successes = result.successes(),
            total = result.total(),
            "quorum not reached, rolling back"
        );
        self.rollback(identifier, &outcomes).await;
        Ok(false)
    }

    async fn refresh<C: Clock>(
        &self,
        identifier: &str,
        lock_timeout: Duration,
        clock: &C,
    ) -> Result<bool, AuthorityError> {
        let held = self.held_mask().clone();
        let deadline = Instant::now() + lock_timeout;

        let refreshes = self
            .members
            .iter()
            .zip(held)
            .enumerate()
            .map(|(index, (member, held))| async move {
                if !held {
                    return false;
                }
                let refresh = member.refresh(identifier, lock_timeout, clock);
                match tokio::time::timeout_at(deadline, refresh).await {
                    Ok(Ok(renewed)) => renewed,
                    Ok(Err(e)) => {
                        tracing::warn!(
                            kind = %self.kind,
                            key = %self.key,
                            member = index,
                            error = %e,
                            "member refresh failed"
                        );
                        false
                    }
                    Err(_) => {
                        tracing::warn!(
                            kind = %self.kind,
                            key = %self.key,
                            member = index,
                            "member refresh timed out"
                        );
                        false
                    }
                }
            });
        let result = QuorumResult::new(join_all(refreshes).await);

        *self.held_mask() = result.outcomes().to_vec();
        Ok(result.has_majority())
    }

    async fn release(&self, identifier: &str) -> Result<bool, AuthorityError> {
        let releases = self.members.iter().map(|member| member.release(identifier));
        let mut removed = false;
        for (index, result) in join_all(releases).await.into_iter().enumerate() {
            match result {
                Ok(r) => removed |= r,
                Err(e) => tracing::warn!(
                    kind = %self.kind,
                    key = %self.key,
                    member = index,
                    error = %e,
                    "member release failed"
                ),
            }
        }

        self.held_mask().iter_mut().for_each(|held| *held = false);
        Ok(removed)
    }

    fn attach(&self) {
        self.held_mask().iter_mut().for_each(|held| *held = true);
    }
}

/// Mutex held by a majority of authorities
pub type RedlockMutex<A, C = SystemClock> = Lock<Quorum<MutexEngine<A>>, C>;

/// Semaphore slot held on a majority of authorities
pub type RedlockSemaphore<A, C = SystemClock> = Lock<Quorum<SemaphoreEngine<A>>, C>;

impl<A: Authority> Lock<Quorum<MutexEngine<A>>, SystemClock> {
    pub fn new(
        authorities: impl IntoIterator<Item = A>,
        key: impl Into<String>,
        options: LockOptions,
    ) -> Result<Self, LockError> {
        Self::with_clock(authorities, key, options, SystemClock)
    }
}

impl<A: Authority, C: Clock> Lock<Quorum<MutexEngine<A>>, C> {
    pub fn with_clock(
        authorities: impl IntoIterator<Item = A>,
        key: impl Into<String>,
        options: LockOptions,
        clock: C,
    ) -> Result<Self, LockError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::EmptyKey.into());
        }
        let members = authorities
            .into_iter()
            .map(|authority| MutexEngine::new(authority, key.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Lock::from_engine(Quorum::new(members)?, options, clock)
    }
}

impl<A: Authority> Lock<Quorum<SemaphoreEngine<A>>, SystemClock> {
    pub fn new(
        authorities: impl IntoIterator<Item = A>,
        key: impl Into<String>,
        limit: u32,
        options: LockOptions,
    ) -> Result<Self, LockError> {
        Self::with_clock(authorities, key, limit, options, SystemClock)
    }
}

impl<A: Authority, C: Clock> Lock<Quorum<SemaphoreEngine<A>>, C> {
    pub fn with_clock(
        authorities: impl IntoIterator<Item = A>,
        key: impl Into<String>,
        limit: u32,
        options: LockOptions,
        clock: C,
    ) -> Result<Self, LockError> {
        let key = semaphore_key(key)?;
        if limit == 0 {
            return Err(ValidationError::ZeroLimit.into());
        }
        let members = authorities
            .into_iter()
            .map(|authority| SemaphoreEngine::new(authority, key.clone(), limit))
            .collect::<Result<Vec<_>, _>>()?;
        Lock::from_engine(Quorum::new(members)?, options, clock)
    }
}

#[cfg(test)]
#[path = "quorum_tests.rs"]
mod tests;
